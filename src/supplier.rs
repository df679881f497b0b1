use std::fmt;

/// A stock supplier. Used purely as a key for upload slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Supplier {
    Rectron,
    Syntech,
    Solarpop,
    Gammatek,
    Booksite,
    Apex,
    Brickup,
    Lookup,
}

impl Supplier {
    pub const ALL: [Supplier; 8] = [
        Supplier::Rectron,
        Supplier::Syntech,
        Supplier::Solarpop,
        Supplier::Gammatek,
        Supplier::Booksite,
        Supplier::Apex,
        Supplier::Brickup,
        Supplier::Lookup,
    ];

    /// Value sent in the `supplier` multipart field.
    pub fn as_str(self) -> &'static str {
        match self {
            Supplier::Rectron => "Rectron",
            Supplier::Syntech => "Syntech",
            Supplier::Solarpop => "Solarpop",
            Supplier::Gammatek => "Gammatek",
            Supplier::Booksite => "Booksite",
            Supplier::Apex => "Apex",
            Supplier::Brickup => "Brickup",
            Supplier::Lookup => "Lookup",
        }
    }

    /// The stock file this supplier usually sends, when it is known.
    pub fn expected_file(self) -> Option<&'static str> {
        match self {
            Supplier::Lookup => Some("skus_and_ids.csv"),
            Supplier::Apex => Some("Apex Interactive SOH Price List.xlsx"),
            Supplier::Solarpop => Some("Solarpop-Rivergate-SOH.csv"),
            Supplier::Brickup => Some("SOH TEMPLATES SPL (MASTER).xlsx"),
            _ => None,
        }
    }

    /// Glob used when assigning files from a folder. Matched case-insensitively.
    pub fn file_pattern(self) -> &'static str {
        match self {
            Supplier::Rectron => "rectron*",
            Supplier::Syntech => "syntech*",
            Supplier::Solarpop => "solarpop*soh*.csv",
            Supplier::Gammatek => "gammatek*",
            Supplier::Booksite => "booksite*",
            Supplier::Apex => "apex*soh*.xlsx",
            Supplier::Brickup => "soh templates spl*.xlsx",
            Supplier::Lookup => "skus_and_ids*.csv",
        }
    }
}

impl fmt::Display for Supplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
