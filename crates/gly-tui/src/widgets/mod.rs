pub mod progress_bar;
pub mod status_bar;
pub mod toast;
pub mod url_input;
