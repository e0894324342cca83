pub mod browser;
pub mod db;
pub mod html_form;
pub mod portal_http;
pub mod session_cache;
