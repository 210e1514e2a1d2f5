use super::{block_on, fail};
use crate::error::AppError;
use crate::models::Tab;
use crate::views::{load_tab, save_tab};

pub fn run(name: Option<String>) {
    let result = block_on(|ctx| async move {
        match name {
            Some(name) => {
                let tab = Tab::from_str(&name).map_err(AppError::InvalidInput)?;
                save_tab(&ctx.store, tab);
                println!("✅ Active tab: {}", tab.as_str());
            }
            None => println!("📑 Active tab: {}", load_tab(&ctx.store).as_str()),
        }
        Ok::<_, AppError>(())
    });

    if let Err(e) = result {
        fail("Tab command failed", e);
    }
}
