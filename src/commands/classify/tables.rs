use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

const FEE_TABLE_MARKER: &str = "Maximum";

pub type FeeTable = Vec<Vec<String>>;

pub fn extract_fee_tables(html: &Html) -> Result<Vec<FeeTable>> {
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;

    let tables = html
        .select(&table_selector)
        .filter(|table| element_text(table).contains(FEE_TABLE_MARKER))
        .map(|table| {
            table
                .select(&row_selector)
                .map(|row| {
                    row.select(&cell_selector)
                        .map(|cell| clean_cell(&element_text(&cell)))
                        .collect::<Vec<String>>()
                })
                .collect::<FeeTable>()
        })
        .collect();
    Ok(tables)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {css}: {err}"))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

pub fn clean_cell(raw: &str) -> String {
    raw.replace(['\r', '\n', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}
