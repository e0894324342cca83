pub mod adapters;
pub mod app;
pub mod domain;
pub mod portal;

#[cfg(test)]
mod test_support;
