//! Tradable companies: the read-only input to voting and rebalancing.

use rust_decimal::Decimal;

/// Business sector classification for a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    Technology,
    Financials,
    Healthcare,
    Energy,
    ConsumerStaples,
    ConsumerDiscretionary,
    Industrials,
    Utilities,
    Materials,
    RealEstate,
    Communications,
    Other,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Technology => "TECHNOLOGY",
            Sector::Financials => "FINANCIALS",
            Sector::Healthcare => "HEALTHCARE",
            Sector::Energy => "ENERGY",
            Sector::ConsumerStaples => "CONSUMER_STAPLES",
            Sector::ConsumerDiscretionary => "CONSUMER_DISCRETIONARY",
            Sector::Industrials => "INDUSTRIALS",
            Sector::Utilities => "UTILITIES",
            Sector::Materials => "MATERIALS",
            Sector::RealEstate => "REAL_ESTATE",
            Sector::Communications => "COMMUNICATIONS",
            Sector::Other => "OTHER",
        }
    }

    /// Parse a sector label. Unknown labels fold into `Other` so company
    /// imports never fail on an unrecognized classification.
    pub fn parse(s: &str) -> Sector {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "TECHNOLOGY" => Sector::Technology,
            "FINANCIALS" | "FINANCIAL" => Sector::Financials,
            "HEALTHCARE" | "HEALTH_CARE" => Sector::Healthcare,
            "ENERGY" => Sector::Energy,
            "CONSUMER_STAPLES" => Sector::ConsumerStaples,
            "CONSUMER_DISCRETIONARY" => Sector::ConsumerDiscretionary,
            "INDUSTRIALS" | "INDUSTRIAL" => Sector::Industrials,
            "UTILITIES" => Sector::Utilities,
            "MATERIALS" => Sector::Materials,
            "REAL_ESTATE" => Sector::RealEstate,
            "COMMUNICATIONS" | "COMMUNICATION_SERVICES" => Sector::Communications,
            _ => Sector::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub sector: Sector,
    /// Latest known market price. `None` until the price-refresh collaborator
    /// has seen the symbol; allocation treats that as a degraded position.
    pub current_price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub is_active: bool,
}

impl Company {
    /// Price usable for allocation: present and strictly positive.
    pub fn tradable_price(&self) -> Option<Decimal> {
        self.current_price.filter(|p| *p > Decimal::ZERO)
    }
}

/// A company row as imported from CSV, before it has a database identity.
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub symbol: String,
    pub sector: Sector,
    pub current_price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
}

/// One price refresh for a symbol.
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
}
