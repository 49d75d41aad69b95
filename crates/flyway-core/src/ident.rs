// Identifiers are plain indices: node IDs line up with ns-3's ToR indices, scenario and variant
// IDs with the numbers embedded in log file names.
macro_rules! identifier {
    ($(#[$doc: meta])* $name: ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Display,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Wraps an index.
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// The wrapped index.
            pub const fn inner(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self(index)
            }
        }
    };
}
