mod helpers;
mod mocks;

mod carts;
mod catalog;
mod listings;
mod orders;
mod payments;
