pub mod u601_bacon_ipsum;
