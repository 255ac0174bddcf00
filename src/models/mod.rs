use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder written for every field the page did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Trimmed text, or `N/A` when the element was absent or blank
pub fn text_or_na(value: Option<String>) -> String {
    match value {
        Some(text) => {
            let text = text.trim();
            if text.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                text.to_string()
            }
        }
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Collapse runs of whitespace (including newlines inside the markup) to single spaces
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Site a listing was scraped from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Source {
    Agriaffaires,
    FarmMachineryLocator,
    Mascus,
}

impl Source {
    pub fn name(&self) -> &'static str {
        match self {
            Source::Agriaffaires => "Agriaffaires",
            Source::FarmMachineryLocator => "FarmMachineryLocator",
            Source::Mascus => "Mascus",
        }
    }

    /// Short lowercase key used in file names
    pub fn key(&self) -> &'static str {
        match self {
            Source::Agriaffaires => "agriaffaires",
            Source::FarmMachineryLocator => "fml",
            Source::Mascus => "mascus",
        }
    }

    /// CSV columns written for this site, in order
    pub fn columns(&self, with_details: bool) -> Vec<Column> {
        match self {
            Source::Agriaffaires => {
                let mut columns = vec![
                    Column::Title,
                    Column::Year,
                    Column::Hours,
                    Column::Horsepower,
                    Column::Location,
                    Column::Price,
                    Column::Url,
                ];
                if with_details {
                    columns.extend([
                        Column::DetailedPrice,
                        Column::Dealer,
                        Column::DealerLocation,
                        Column::PhoneNumbers,
                        Column::Specifications,
                    ]);
                }
                columns
            }
            Source::FarmMachineryLocator => vec![
                Column::Title,
                Column::Price,
                Column::Hours,
                Column::Location,
                Column::Category,
                Column::Seller,
                Column::PhoneNumbers,
                Column::Url,
            ],
            Source::Mascus => vec![
                Column::Title,
                Column::Year,
                Column::Hours,
                Column::Company,
                Column::CompanyUrl,
                Column::Url,
            ],
        }
    }
}

/// One output column of a listing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    Price,
    Year,
    Hours,
    Horsepower,
    Location,
    Category,
    Url,
    DetailedPrice,
    Dealer,
    Seller,
    Company,
    CompanyUrl,
    DealerLocation,
    PhoneNumbers,
    Specifications,
}

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Column::Title => "Title",
            Column::Price => "Price",
            Column::Year => "Year",
            Column::Hours => "Hours",
            Column::Horsepower => "Horsepower",
            Column::Location => "Location",
            Column::Category => "Category",
            Column::Url => "URL",
            Column::DetailedPrice => "Detailed Price",
            Column::Dealer => "Dealer",
            Column::Seller => "Seller",
            Column::Company => "Company",
            Column::CompanyUrl => "Company URL",
            Column::DealerLocation => "Dealer Location",
            Column::PhoneNumbers => "Phone Numbers",
            Column::Specifications => "Specifications",
        }
    }
}

/// Fields only found on a listing's own page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingDetail {
    pub price: String,
    pub dealer: String,
    pub dealer_location: String,
    pub phone_numbers: Vec<String>,
    /// Specification table rows, in page order
    pub specifications: Vec<(String, String)>,
}

impl ListingDetail {
    /// Detail for a listing whose page could not be loaded
    pub fn unavailable() -> Self {
        Self {
            price: NOT_AVAILABLE.to_string(),
            dealer: NOT_AVAILABLE.to_string(),
            dealer_location: NOT_AVAILABLE.to_string(),
            phone_numbers: Vec::new(),
            specifications: Vec::new(),
        }
    }
}

/// One scraped machinery advertisement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub source: Source,
    pub title: String,
    pub price: String,
    pub year: String,
    pub hours: String,
    pub horsepower: String,
    pub location: String,
    pub category: String,
    pub url: String,
    pub dealer: String,
    pub dealer_url: String,
    pub phone_numbers: Vec<String>,
    pub detail: Option<ListingDetail>,
    pub scraped_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(source: Source, title: String, url: String) -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            source,
            title,
            price: na(),
            year: na(),
            hours: na(),
            horsepower: na(),
            location: na(),
            category: na(),
            url,
            dealer: na(),
            dealer_url: na(),
            phone_numbers: Vec::new(),
            detail: None,
            scraped_at: Utc::now(),
        }
    }

    /// Attach a detail page; the listing keeps its own summary fields
    pub fn apply_detail(&mut self, detail: ListingDetail) {
        self.detail = Some(detail);
    }

    /// Render one cell of the CSV row
    pub fn field(&self, column: Column) -> String {
        let detail = self.detail.as_ref();
        match column {
            Column::Title => self.title.clone(),
            Column::Price => self.price.clone(),
            Column::Year => self.year.clone(),
            Column::Hours => self.hours.clone(),
            Column::Horsepower => self.horsepower.clone(),
            Column::Location => self.location.clone(),
            Column::Category => self.category.clone(),
            Column::Url => self.url.clone(),
            Column::Seller | Column::Company => self.dealer.clone(),
            Column::CompanyUrl => self.dealer_url.clone(),
            Column::DetailedPrice => detail
                .map(|d| d.price.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            Column::Dealer => detail
                .map(|d| d.dealer.clone())
                .unwrap_or_else(|| self.dealer.clone()),
            Column::DealerLocation => detail
                .map(|d| d.dealer_location.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            Column::PhoneNumbers => {
                let phones = match detail {
                    Some(d) if !d.phone_numbers.is_empty() => &d.phone_numbers,
                    _ => &self.phone_numbers,
                };
                phones.join("; ")
            }
            Column::Specifications => detail
                .map(|d| render_specifications(&d.specifications))
                .unwrap_or_else(|| "{}".to_string()),
        }
    }

    pub fn record(&self, columns: &[Column]) -> Vec<String> {
        columns.iter().map(|c| self.field(*c)).collect()
    }
}

/// JSON object text that keeps the table's row order; a repeated label keeps its
/// first position and its last value
fn render_specifications(specs: &[(String, String)]) -> String {
    let object: serde_json::Map<String, serde_json::Value> = specs
        .iter()
        .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
        .collect();
    serde_json::Value::Object(object).to_string()
}

/// Postal address of a dealer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DealerAddress {
    pub street_address: String,
    pub postal_code: String,
    pub locality: String,
}

/// One entry of the Agriaffaires dealer directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dealer {
    pub name: String,
    pub url: String,
    pub activity: String,
    pub location: String,
    pub brands: Vec<String>,
    pub ads_count: String,
    pub main_address: DealerAddress,
    pub addresses: Vec<DealerAddress>,
}

impl Dealer {
    pub const HEADERS: [&'static str; 10] = [
        "Name",
        "URL",
        "Activity",
        "Location",
        "Brands",
        "Ads Count",
        "Main Street Address",
        "Main Postal Code",
        "Main Address Locality",
        "Additional Addresses",
    ];

    pub fn record(&self) -> Vec<String> {
        let additional: Vec<String> = self
            .addresses
            .iter()
            .map(|a| format!("{} {}", a.postal_code, a.locality))
            .collect();

        vec![
            self.name.clone(),
            self.url.clone(),
            self.activity.clone(),
            self.location.clone(),
            self.brands.join(", "),
            self.ads_count.clone(),
            self.main_address.street_address.clone(),
            self.main_address.postal_code.clone(),
            self.main_address.locality.clone(),
            additional.join("; "),
        ]
    }
}
