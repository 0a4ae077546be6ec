use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 数据域: 产品 / 客户
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Products,
    Clients,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Products => "products",
            Domain::Clients => "clients",
        }
    }

    /// 本地暂存键
    pub fn staging_key(&self) -> String {
        format!("{}_file_data", self.as_str())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "products" => Ok(Domain::Products),
            "clients" => Ok(Domain::Clients),
            other => Err(format!("unknown domain: {}", other)),
        }
    }
}

/// 单元格值
///
/// JSON 中不带标签: null / bool / number / "YYYY-MM-DD" / string。
/// 读回时形如日期的文本会被还原为 `Date`，显示结果一致。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    /// 空值或仅含空白的文本
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 去除首尾空白后的文本表示，空白返回 None
    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            // 整数值不带小数点 (CUIT 常以数字单元格出现)
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// 数据来源格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Excel,
    Csv,
}

/// 解析后的原始数据集: 表头 + 数据行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub file_name: String,
    pub total_rows: usize,
    pub source: SourceKind,
}

impl RawDataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>, file_name: impl Into<String>, source: SourceKind) -> Self {
        let width = headers.len();
        let rows: Vec<Vec<Cell>> = rows
            .into_iter()
            .map(|mut row| {
                row.truncate(width);
                row
            })
            .collect();
        Self {
            total_rows: rows.len(),
            headers,
            rows,
            file_name: file_name.into(),
            source,
        }
    }

    /// 按位置取单元格，缺失的尾部单元格视为不存在
    pub fn cell(row: &[Cell], column: usize) -> Option<&Cell> {
        row.get(column)
    }
}
