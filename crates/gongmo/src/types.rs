use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A detail page found on the IPO calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub url: String,
    pub date: NaiveDate,
}

impl Display for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.date, self.name, self.url)
    }
}

/// Result of scanning calendar pages for listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub listings: Vec<Listing>,
    pub spacs_filtered: usize,
}

impl Discovery {
    pub fn extend(&mut self, other: Discovery) {
        self.listings.extend(other.listings);
        self.spacs_filtered += other.spacs_filtered;
    }
}

/// Everything extracted from one IPO detail page.
///
/// Text fields that could not be read hold `"N/A"`; numeric fields hold `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpoRecord {
    pub name: String,
    pub url: String,

    pub market_segment: String,
    pub sector: String,
    pub revenue: Option<i64>,
    pub profit_pre_tax: Option<i64>,
    pub net_profit: Option<i64>,
    pub capital: Option<i64>,

    pub total_shares: Option<i64>,
    pub par_value: Option<i64>,
    pub desired_price_range: String,
    pub confirmed_price: Option<i64>,
    pub offering_amount: Option<i64>,
    pub underwriter: String,

    pub listing_date: String,
    pub competition_rate: String,
    pub employee_shares: Option<i64>,
    pub institutional_shares: Option<i64>,
    pub retail_shares: Option<i64>,

    pub tradable_shares_count: String,
    pub tradable_shares_percent: String,
}

fn show(value: Option<i64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

impl Display for IpoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ {} ─ {}", self.name, self.market_segment, self.listing_date)?;
        writeln!(f, "│  URL: {}", self.url)?;
        writeln!(f, "│  Sector: {}", self.sector)?;
        writeln!(
            f,
            "│  Revenue: {}  Pre-tax profit: {}  Net profit: {}  Capital: {}",
            show(self.revenue),
            show(self.profit_pre_tax),
            show(self.net_profit),
            show(self.capital)
        )?;
        writeln!(
            f,
            "│  Offering: {} shares, par {}, desired {}, confirmed {}, amount {}",
            show(self.total_shares),
            show(self.par_value),
            self.desired_price_range,
            show(self.confirmed_price),
            show(self.offering_amount)
        )?;
        writeln!(f, "│  Underwriter: {}", self.underwriter)?;
        writeln!(f, "│  Institutional competition: {}", self.competition_rate)?;
        writeln!(
            f,
            "│  Allotment: employees {}, institutions {}, retail {}",
            show(self.employee_shares),
            show(self.institutional_shares),
            show(self.retail_shares)
        )?;
        write!(
            f,
            "└─ Tradable after offering: {} ({})",
            self.tradable_shares_count, self.tradable_shares_percent
        )
    }
}
