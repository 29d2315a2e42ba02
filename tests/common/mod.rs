#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Three delimited source files in a temporary directory.
pub struct SourceFiles {
    _dir: TempDir,
    pub transactions: PathBuf,
    pub households: PathBuf,
    pub products: PathBuf,
}

pub fn write_sources(transactions: &str, households: &str, products: &str) -> SourceFiles {
    let dir = TempDir::new().expect("temp dir");
    let write = |name: &str, contents: &str| {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    };
    let transactions = write("transactions.csv", transactions);
    let households = write("households.csv", households);
    let products = write("products.csv", products);
    SourceFiles {
        _dir: dir,
        transactions,
        households,
        products,
    }
}

pub const TRANSACTIONS_HEADER: &str = "HSHD_NUM,BASKET_NUM,PURCHASE_,PRODUCT_NUM,SPEND,UNITS,STORE_R,WEEK_NUM,YEAR\n";
pub const HOUSEHOLDS_HEADER: &str = "HSHD_NUM,L,AGE_RANGE,MARITAL,INCOME_RANGE,HOMEOWNER,HSHD_COMPOSITION,HH_SIZE,CHILDREN\n";
pub const PRODUCTS_HEADER: &str = "PRODUCT_NUM,DEPARTMENT,COMMODITY,BRAND_TY,NATURAL_ORGANIC_FLAG\n";

/// The three-line scenario: one household of size 3, two baskets.
pub fn scenario_sources() -> SourceFiles {
    write_sources(
        &format!(
            "{}{}{}{}",
            TRANSACTIONS_HEADER,
            "1,1,17-AUG-18,1,10,1,EAST,33,2018\n",
            "1,1,17-AUG-18,2,5,1,EAST,33,2018\n",
            "1,2,24-AUG-18,1,20,2,EAST,34,2018\n",
        ),
        &format!("{}{}", HOUSEHOLDS_HEADER, "1,Y,35-44,Married,50-74K,Homeowner,2 Adults and Kids,3,1\n"),
        &format!(
            "{}{}{}",
            PRODUCTS_HEADER,
            "1,D,C,PRIVATE,N\n",
            "2,D,C,NATIONAL,N\n",
        ),
    )
}
