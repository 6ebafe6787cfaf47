use once_cell::sync::Lazy;
use std::sync::Arc;

pub static HOME_DIR: Lazy<Arc<str>> = Lazy::new(|| {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USER").map(|user| format!("/home/{}", user)))
        .unwrap_or_else(|_| ".".to_string())
        .into()
});

pub static CONFIG_DIR: Lazy<Arc<str>> = Lazy::new(|| {
    let base = std::env::var("XDG_CONFIG_HOME")
        .unwrap_or_else(|_| format!("{}/.config", HOME_DIR.as_ref()));
    format!("{}/posemgr", base).into()
});
