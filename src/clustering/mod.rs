pub mod group_products;
pub mod representatives;
