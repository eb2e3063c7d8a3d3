//! CSV import adapter for the company directory and price feeds.
//!
//! Company files carry `symbol,name,sector,price,market_cap` with the last
//! two columns optional. Price files carry `symbol,price`.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::company::{NewCompany, PriceUpdate, Sector};
use crate::domain::error::IndexpoolError;

fn import_err(reason: impl Into<String>) -> IndexpoolError {
    IndexpoolError::CsvImport {
        reason: reason.into(),
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, name: &str) -> Result<&'a str, IndexpoolError> {
    record
        .get(idx)
        .ok_or_else(|| import_err(format!("missing {name} column")))
}

fn parse_decimal(raw: &str, name: &str) -> Result<Option<Decimal>, IndexpoolError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .map(Some)
        .map_err(|e| import_err(format!("invalid {name} value '{raw}': {e}")))
}

pub fn read_companies<P: AsRef<Path>>(path: P) -> Result<Vec<NewCompany>, IndexpoolError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| import_err(format!("failed to read {}: {e}", path.display())))?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut companies = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| import_err(format!("CSV parse error: {e}")))?;

        let symbol = field(&record, 0, "symbol")?.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(import_err("empty symbol"));
        }
        let name = field(&record, 1, "name")?.trim().to_string();
        let sector = Sector::parse(field(&record, 2, "sector")?);
        let current_price = parse_decimal(field(&record, 3, "price")?, "price")?;
        let market_cap = parse_decimal(field(&record, 4, "market_cap")?, "market_cap")?;

        if let Some(price) = current_price
            && price < Decimal::ZERO
        {
            return Err(import_err(format!("negative price for {symbol}")));
        }

        companies.push(NewCompany {
            name,
            symbol,
            sector,
            current_price,
            market_cap,
        });
    }
    Ok(companies)
}

pub fn read_price_updates<P: AsRef<Path>>(path: P) -> Result<Vec<PriceUpdate>, IndexpoolError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| import_err(format!("failed to read {}: {e}", path.display())))?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut updates = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| import_err(format!("CSV parse error: {e}")))?;

        let symbol = field(&record, 0, "symbol")?.trim().to_uppercase();
        let price = parse_decimal(field(&record, 1, "price")?, "price")?
            .ok_or_else(|| import_err(format!("missing price for {symbol}")))?;
        if price < Decimal::ZERO {
            return Err(import_err(format!("negative price for {symbol}")));
        }

        updates.push(PriceUpdate { symbol, price });
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn read_companies_parses_full_rows() {
        let file = write_csv(
            "symbol,name,sector,price,market_cap\n\
             aapl,Apple Inc,Technology,185.50,2900000000000\n\
             XOM,Exxon Mobil,Energy,104.25,420000000000\n",
        );
        let companies = read_companies(file.path()).unwrap();

        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].symbol, "AAPL");
        assert_eq!(companies[0].sector, Sector::Technology);
        assert_eq!(companies[0].current_price, Some(dec!(185.50)));
        assert_eq!(companies[1].sector, Sector::Energy);
    }

    #[test]
    fn read_companies_allows_missing_price_and_cap() {
        let file = write_csv("symbol,name,sector,price,market_cap\nNEWCO,New Co,Technology,,\n");
        let companies = read_companies(file.path()).unwrap();

        assert_eq!(companies[0].current_price, None);
        assert_eq!(companies[0].market_cap, None);
    }

    #[test]
    fn read_companies_maps_unknown_sector_to_other() {
        let file = write_csv("symbol,name,sector,price,market_cap\nACME,Acme,Blacksmithing,1,\n");
        let companies = read_companies(file.path()).unwrap();
        assert_eq!(companies[0].sector, Sector::Other);
    }

    #[test]
    fn read_companies_rejects_negative_price() {
        let file = write_csv("symbol,name,sector,price,market_cap\nBAD,Bad Co,Energy,-3,\n");
        let result = read_companies(file.path());
        assert!(matches!(result, Err(IndexpoolError::CsvImport { .. })));
    }

    #[test]
    fn read_companies_rejects_bad_decimal() {
        let file = write_csv("symbol,name,sector,price,market_cap\nBAD,Bad Co,Energy,abc,\n");
        let result = read_companies(file.path());
        assert!(matches!(result, Err(IndexpoolError::CsvImport { .. })));
    }

    #[test]
    fn read_price_updates_parses_rows() {
        let file = write_csv("symbol,price\nAAPL,190.00\nxom,99.10\n");
        let updates = read_price_updates(file.path()).unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].symbol, "AAPL");
        assert_eq!(updates[0].price, dec!(190.00));
        assert_eq!(updates[1].symbol, "XOM");
    }

    #[test]
    fn read_price_updates_requires_price() {
        let file = write_csv("symbol,price\nAAPL,\n");
        let result = read_price_updates(file.path());
        assert!(matches!(result, Err(IndexpoolError::CsvImport { .. })));
    }

    #[test]
    fn read_errors_for_missing_file() {
        let result = read_companies("/nonexistent/companies.csv");
        assert!(matches!(result, Err(IndexpoolError::CsvImport { .. })));
    }
}
