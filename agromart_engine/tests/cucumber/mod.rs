mod setups;
pub mod world;

pub use world::MarketWorld;
