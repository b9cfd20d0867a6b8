/// Implements `Display` and `FromStr` for a unit-only enum from a table of
/// keywords. The first keyword of each row is the canonical spelling used in
/// reports; the remaining ones are accepted aliases.
macro_rules! keyword_enum {
    ($ty:ident { $($variant:ident => [$canon:literal $(, $alias:literal)*]),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $($ty::$variant => $canon,)+
                };
                f.write_str(s)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let key = s.trim().to_ascii_lowercase();
                $(
                    if key == $canon $(|| key == $alias)* {
                        return Ok($ty::$variant);
                    }
                )+
                Err(format!(
                    "unknown {} '{}' (expected one of: {})",
                    stringify!($ty),
                    s.trim(),
                    [$($canon),+].join(", ")
                ))
            }
        }
    };
}
