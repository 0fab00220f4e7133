/// Generate enums for codepoints in protocols.
///
/// # Example
///
/// ```rust
/// # #[macro_use] extern crate routewire;
/// # fn main() {
/// typeenum!(
///     /// Subsequent Address Family Identifiers.
///     Safi, u8,
///     {
///         1 => Unicast,
///         2 => Multicast,
///         128 => MplsVpn,
///     });
///
/// assert_eq!(Safi::from(128), Safi::MplsVpn);
/// assert_eq!(u8::from(Safi::Unimplemented(99)), 99);
/// assert_eq!(Safi::from(7).to_string(), "unknown-Safi-7");
/// # }
/// ```
/// This will create a `pub enum Safi`, comprised of variants `Unicast`,
/// `Multicast` and `MplsVpn`, plus an `Unimplemented(u8)` catch-all. On this
/// enum, the [`From`] (for conversion between the variants and `u8`) and
/// [`std::fmt::Display`] traits are implemented.
#[macro_export]
macro_rules! typeenum {
    ($(#[$attr:meta])* $name:ident, $ty:ty,
        { $($x:expr => $y:ident),+ $(,)* }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
        pub enum $name {
            $($y),+,
            Unimplemented($ty),
        }

        impl From<$ty> for $name {
            fn from(f: $ty) -> $name {
                match f {
                    $($x => $name::$y,)+
                    u => $name::Unimplemented(u),
                }
            }
        }

        impl From<$name> for $ty {
            fn from(s: $name) -> $ty {
                match s {
                    $($name::$y => $x,)+
                    $name::Unimplemented(u) => u,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter)
                -> Result<(), std::fmt::Error>
            {
                match self {
                    $($name::$y => write!(f, stringify!($y))),+,
                    $name::Unimplemented(u) =>
                        write!(f, "unknown-{}-{}", stringify!($name), u)
                }
            }
        }
    }
}
