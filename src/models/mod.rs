pub mod banner;
pub mod menu;
pub mod order;
pub mod place;
pub mod product;
pub mod restaurant;
