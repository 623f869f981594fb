//! Helper for enumerations whose integer values are part of the binary format.

/// Declares a `#[repr(i32)]` enum with contiguous discriminants starting at
/// `$base`, a mnemonic per variant, and checked conversion from `i32`.
macro_rules! stable_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $base:literal {
            $first:ident => $first_text:literal,
            $($variant:ident => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(into = "i32", try_from = "i32")]
        #[repr(i32)]
        pub enum $name {
            #[doc = $first_text]
            $first = $base,
            $(
                #[doc = $text]
                $variant,
            )*
        }

        impl $name {
            /// Every variant in numbering order.
            pub const ALL: &'static [$name] = &[$name::$first, $($name::$variant,)*];

            /// First value of the numbering.
            pub const BASE: i32 = $base;

            /// The mnemonic used in listings and diagnostics.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $name::$first => $first_text,
                    $($name::$variant => $text,)*
                }
            }

            /// Stable integer value.
            pub fn code(self) -> i32 {
                self as i32
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = String;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                value
                    .checked_sub($base)
                    .and_then(|index| usize::try_from(index).ok())
                    .and_then(|index| $name::ALL.get(index).copied())
                    .ok_or_else(|| format!("invalid {} value: {}", stringify!($name), value))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}
