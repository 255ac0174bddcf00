pub mod agriaffaires;
pub mod dealers;
pub mod farm_machinery_locator;
pub mod html;
pub mod listing;
pub mod mascus;
pub mod paginate;
pub mod traits;
pub mod types;

pub use agriaffaires::AgriaffairesParser;
pub use dealers::DealerScraper;
pub use farm_machinery_locator::FarmMachineryLocatorParser;
pub use listing::ListingScraper;
pub use mascus::MascusParser;
pub use traits::{ScraperTrait, SiteParser};
pub use types::ScrapeOptions;
