//! Symbol identity parsing and validation
//!
//! Implements the textual identity format:
//! `CATEGORY:MARKET:TICKER[:EXPIRY[:RIGHT:STRIKE[:STYLE]]]`

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strikes are written into entry names scaled by this factor
const STRIKE_SCALE: i64 = 10_000;

/// Decimal places representable after scaling by [`STRIKE_SCALE`]
const STRIKE_DECIMALS: u32 = 4;

/// Instrument category of a symbol
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentCategory {
    /// Listed equity
    Equity,
    /// Spot currency pair
    Forex,
    /// Contract for difference
    Cfd,
    /// Crypto spot pair
    Crypto,
    /// Cash index
    Index,
    /// Dated future
    Future,
    /// Equity option
    Option,
    /// Option on a future
    FutureOption,
    /// Index option
    IndexOption,
    /// Physical commodity (no storage convention)
    Commodity,
}

impl InstrumentCategory {
    /// Futures and every option variant
    pub fn is_derivative(&self) -> bool {
        matches!(
            self,
            InstrumentCategory::Future
                | InstrumentCategory::Option
                | InstrumentCategory::FutureOption
                | InstrumentCategory::IndexOption
        )
    }

    /// Any option variant
    pub fn is_option(&self) -> bool {
        matches!(
            self,
            InstrumentCategory::Option
                | InstrumentCategory::FutureOption
                | InstrumentCategory::IndexOption
        )
    }

    /// Lowercase directory name used in archive paths
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentCategory::Equity => "equity",
            InstrumentCategory::Forex => "forex",
            InstrumentCategory::Cfd => "cfd",
            InstrumentCategory::Crypto => "crypto",
            InstrumentCategory::Index => "index",
            InstrumentCategory::Future => "future",
            InstrumentCategory::Option => "option",
            InstrumentCategory::FutureOption => "futureoption",
            InstrumentCategory::IndexOption => "indexoption",
            InstrumentCategory::Commodity => "commodity",
        }
    }
}

impl fmt::Display for InstrumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstrumentCategory {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equity" => Ok(InstrumentCategory::Equity),
            "forex" => Ok(InstrumentCategory::Forex),
            "cfd" => Ok(InstrumentCategory::Cfd),
            "crypto" => Ok(InstrumentCategory::Crypto),
            "index" => Ok(InstrumentCategory::Index),
            "future" => Ok(InstrumentCategory::Future),
            "option" => Ok(InstrumentCategory::Option),
            "futureoption" => Ok(InstrumentCategory::FutureOption),
            "indexoption" => Ok(InstrumentCategory::IndexOption),
            "commodity" => Ok(InstrumentCategory::Commodity),
            other => Err(IdentifierError::InvalidFormat(format!(
                "unknown instrument category: {other}"
            ))),
        }
    }
}

/// Exercise style of an option chain
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OptionStyle {
    /// Exercisable any time before expiry
    American,
    /// Exercisable at expiry only
    European,
}

impl OptionStyle {
    /// Lowercase name used in archive paths
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionStyle::American => "american",
            OptionStyle::European => "european",
        }
    }
}

impl FromStr for OptionStyle {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "american" => Ok(OptionStyle::American),
            "european" => Ok(OptionStyle::European),
            other => Err(IdentifierError::InvalidFormat(format!(
                "unknown option style: {other}"
            ))),
        }
    }
}

/// Call or put
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OptionRight {
    /// Call option
    Call,
    /// Put option
    Put,
}

impl OptionRight {
    /// Lowercase name used in entry names
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionRight::Call => "call",
            OptionRight::Put => "put",
        }
    }
}

impl FromStr for OptionRight {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionRight::Call),
            "P" | "PUT" => Ok(OptionRight::Put),
            other => Err(IdentifierError::InvalidFormat(format!(
                "unknown option right: {other}"
            ))),
        }
    }
}

/// Right and strike of a single option contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionTerms {
    /// Call or put
    pub right: OptionRight,
    /// Strike price
    pub strike: Decimal,
}

/// Contract details of a dated derivative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Contract {
    /// Expiry date
    pub expiry: NaiveDate,
    /// Present for option contracts only
    pub option: Option<OptionTerms>,
}

/// Identity of a tradable instrument
///
/// Market is normalized to lowercase and the ticker to uppercase. For
/// derivatives the ticker is the root ticker shared by the whole chain and
/// [`SymbolId::canonical`] names the chain itself.
///
/// # Examples
///
/// ```
/// use market_archive::identifier::{InstrumentCategory, SymbolId};
///
/// let id = SymbolId::parse("OPTION:USA:AAPL:2020-03-20:C:300").unwrap();
/// assert_eq!(id.category(), InstrumentCategory::Option);
/// assert_eq!(id.market(), "usa");
/// assert_eq!(id.ticker(), "AAPL");
/// assert!(id.canonical().is_canonical());
/// ```
///
/// Not `Deserialize`: every instance goes through the component checks in
/// [`SymbolId::parse`] or the constructors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SymbolId {
    category: InstrumentCategory,
    market: String,
    ticker: String,
    style: Option<OptionStyle>,
    contract: Option<Contract>,
}

impl SymbolId {
    /// Create a non-derivative symbol (equity, forex, crypto, ...)
    pub fn new(
        category: InstrumentCategory,
        market: &str,
        ticker: &str,
    ) -> Result<Self, IdentifierError> {
        if category.is_derivative() {
            return Err(IdentifierError::InvalidFormat(format!(
                "{category} symbols need contract details"
            )));
        }
        Self::build(category, market, ticker, None, None)
    }

    /// Create a future contract
    pub fn future(market: &str, root: &str, expiry: NaiveDate) -> Result<Self, IdentifierError> {
        Self::build(
            InstrumentCategory::Future,
            market,
            root,
            None,
            Some(Contract {
                expiry,
                option: None,
            }),
        )
    }

    /// Create an option contract of any option category
    pub fn option(
        category: InstrumentCategory,
        market: &str,
        root: &str,
        expiry: NaiveDate,
        right: OptionRight,
        strike: Decimal,
        style: OptionStyle,
    ) -> Result<Self, IdentifierError> {
        if !category.is_option() {
            return Err(IdentifierError::InvalidFormat(format!(
                "{category} is not an option category"
            )));
        }
        if strike <= Decimal::ZERO {
            return Err(IdentifierError::InvalidFormat(format!(
                "strike must be positive, got {strike}"
            )));
        }
        // Entry names carry the strike scaled to an integer
        if strike.normalize().scale() > STRIKE_DECIMALS {
            return Err(IdentifierError::InvalidFormat(format!(
                "strike {strike} has more than {STRIKE_DECIMALS} decimal places"
            )));
        }
        if (strike * Decimal::from(STRIKE_SCALE)).trunc().to_i64().is_none() {
            return Err(IdentifierError::InvalidFormat(format!(
                "strike out of range: {strike}"
            )));
        }
        Self::build(
            category,
            market,
            root,
            Some(style),
            Some(Contract {
                expiry,
                option: Some(OptionTerms { right, strike }),
            }),
        )
    }

    fn build(
        category: InstrumentCategory,
        market: &str,
        ticker: &str,
        style: Option<OptionStyle>,
        contract: Option<Contract>,
    ) -> Result<Self, IdentifierError> {
        let market = market.trim().to_lowercase();
        if market.is_empty() {
            return Err(IdentifierError::InvalidFormat(
                "market component cannot be empty".to_string(),
            ));
        }
        if !market.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentifierError::InvalidFormat(format!(
                "invalid market: {market}"
            )));
        }

        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(IdentifierError::InvalidFormat(
                "ticker component cannot be empty".to_string(),
            ));
        }
        // Tickers become path components
        if ticker.contains("..")
            || ticker.chars().all(|c| c == '.')
            || !ticker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(IdentifierError::InvalidFormat(format!(
                "invalid ticker: {ticker}"
            )));
        }

        Ok(Self {
            category,
            market,
            ticker,
            style,
            contract,
        })
    }

    /// Parse an identity string
    ///
    /// Input is case-insensitive. Accepted shapes:
    ///
    /// - `EQUITY:USA:AAPL` (any non-derivative category)
    /// - `FUTURE:CME:ES` (canonical) or `FUTURE:CME:ES:2020-03-20`
    /// - `OPTION:USA:AAPL` (canonical, American) or
    ///   `OPTION:USA:AAPL:2020-03-20:C:300[:EUROPEAN]`
    ///
    /// # Errors
    ///
    /// Returns an error if the shape does not match the category or any
    /// component is empty or malformed.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() < 3 {
            return Err(IdentifierError::InvalidFormat(
                "invalid identifier format: expected CATEGORY:MARKET:TICKER".to_string(),
            ));
        }

        let category = InstrumentCategory::from_str(parts[0])?;
        let (market, ticker) = (parts[1], parts[2]);

        match (category, parts.len()) {
            (c, 3) if c.is_option() => {
                Self::build(c, market, ticker, Some(OptionStyle::American), None)
            }
            (c, 3) => Self::build(c, market, ticker, None, None),
            (InstrumentCategory::Future, 4) => {
                Self::future(market, ticker, parse_expiry(parts[3])?)
            }
            (c, 6) | (c, 7) if c.is_option() => {
                let expiry = parse_expiry(parts[3])?;
                let right = OptionRight::from_str(parts[4])?;
                let strike = Decimal::from_str(parts[5]).map_err(|e| {
                    IdentifierError::InvalidFormat(format!("invalid strike {}: {e}", parts[5]))
                })?;
                let style = match parts.get(6) {
                    Some(style) => OptionStyle::from_str(style)?,
                    None => OptionStyle::American,
                };
                Self::option(c, market, ticker, expiry, right, strike, style)
            }
            (c, n) => Err(IdentifierError::InvalidFormat(format!(
                "{c} identifier cannot have {n} components"
            ))),
        }
    }

    /// Instrument category
    pub fn category(&self) -> InstrumentCategory {
        self.category
    }

    /// Market (lowercase)
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Ticker (uppercase); the root ticker for derivatives
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Option style, present for option categories
    pub fn style(&self) -> Option<OptionStyle> {
        self.style
    }

    /// Contract details, absent for canonical and non-derivative symbols
    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }

    /// Whether this identity names a whole chain rather than one contract
    pub fn is_canonical(&self) -> bool {
        self.contract.is_none()
    }

    /// The chain this symbol belongs to
    ///
    /// Non-derivatives are their own canonical identity.
    pub fn canonical(&self) -> SymbolId {
        Self {
            contract: None,
            ..self.clone()
        }
    }

    /// Strike multiplied by 10000, as written into entry names
    pub fn scaled_strike(&self) -> Option<i64> {
        self.contract
            .and_then(|c| c.option)
            .and_then(|o| (o.strike * Decimal::from(STRIKE_SCALE)).trunc().to_i64())
    }
}

fn parse_expiry(s: &str) -> Result<NaiveDate, IdentifierError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|e| IdentifierError::InvalidFormat(format!("invalid expiry {s}: {e}")))
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.category.as_str().to_uppercase(),
            self.market.to_uppercase(),
            self.ticker
        )?;
        if let Some(contract) = &self.contract {
            write!(f, ":{}", contract.expiry.format("%Y-%m-%d"))?;
            if let Some(option) = &contract.option {
                let right = match option.right {
                    OptionRight::Call => "C",
                    OptionRight::Put => "P",
                };
                write!(f, ":{}:{}", right, option.strike.normalize())?;
                if let Some(style) = self.style {
                    write!(f, ":{}", style.as_str().to_uppercase())?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for SymbolId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors that can occur during identifier parsing
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Invalid identifier format
    #[error("identifier error: {0}")]
    InvalidFormat(String),
}
