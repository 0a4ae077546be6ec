use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Datelike, Duration, NaiveDate};
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::io::Cursor;

use crate::error::ParseError;
use crate::models::{Cell, RawDataset, SourceKind};

/// 接受的日期年份范围，超出视为误判的序列号
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// 按扩展名解析上传文件
pub fn parse_file(file_name: &str, bytes: &[u8]) -> Result<RawDataset, ParseError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let dataset = match extension.as_str() {
        "csv" => parse_csv(file_name, bytes)?,
        "xls" | "xlsx" => parse_workbook(file_name, bytes)?,
        _ => return Err(ParseError::UnsupportedFormat(file_name.to_string())),
    };

    if dataset.rows.is_empty() {
        return Err(ParseError::EmptyFile(file_name.to_string()));
    }

    tracing::info!(
        "Parsed {}: {} rows, {} columns",
        file_name,
        dataset.total_rows,
        dataset.headers.len()
    );
    Ok(dataset)
}

/// 文本解码: UTF-8 (去 BOM) 优先，失败时按 Windows-1252 解码
///
/// Windows 版 Excel 导出的西语 CSV 多为 Windows-1252。
fn decode_text<'a>(file_name: &str, bytes: &'a [u8]) -> Cow<'a, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(_) => {
            let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
            if had_errors {
                tracing::warn!("{}: some characters could not be decoded", file_name);
            } else {
                tracing::warn!("{} is not UTF-8, decoded as Windows-1252", file_name);
            }
            decoded
        }
    }
}

/// CSV: 无表头模式读取，丢弃全空行，首行作表头
fn parse_csv(file_name: &str, bytes: &[u8]) -> Result<RawDataset, ParseError> {
    let text = decode_text(file_name, bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ParseError::Malformed {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect());
    }

    let mut iter = records.into_iter();
    let Some(headers) = iter.next() else {
        return Err(ParseError::EmptyFile(file_name.to_string()));
    };
    let rows = iter.map(|r| r.into_iter().map(Cell::Text).collect()).collect();

    Ok(RawDataset::new(headers, rows, file_name, SourceKind::Csv))
}

/// Excel: 仅第一张工作表，首行作表头
fn parse_workbook(file_name: &str, bytes: &[u8]) -> Result<RawDataset, ParseError> {
    let malformed = |reason: String| ParseError::Malformed {
        file: file_name.to_string(),
        reason,
    };

    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| malformed(e.to_string()))?;

    let sheet_names = workbook.sheet_names();
    let Some(first_sheet) = sheet_names.first() else {
        return Err(ParseError::EmptyFile(file_name.to_string()));
    };
    let range = workbook
        .worksheet_range(first_sheet)
        .map_err(|e| malformed(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(ParseError::EmptyFile(file_name.to_string()));
    };
    let mut headers: Vec<String> = header_row
        .iter()
        .map(|c| convert_cell(c).to_string().trim().to_string())
        .collect();

    let data_rows: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(convert_cell).collect::<Vec<_>>())
        .filter(|row: &Vec<Cell>| !row.iter().all(Cell::is_blank))
        .collect();

    // 去掉末尾空列: 表头与所有数据行在该列都为空才去掉
    let header_width = headers.iter().rposition(|h| !h.is_empty()).map_or(0, |i| i + 1);
    let data_width = data_rows
        .iter()
        .filter_map(|row| row.iter().rposition(|c| !c.is_blank()))
        .map(|i| i + 1)
        .max()
        .unwrap_or(0);
    headers.truncate(header_width.max(data_width));

    Ok(RawDataset::new(headers, data_rows, file_name, SourceKind::Excel))
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => serial_to_date(dt.as_f64()).map_or(Cell::Empty, Cell::Date),
        Data::DateTimeIso(s) => match parse_iso_date(s) {
            Some(d) if year_in_range(d) => Cell::Date(d),
            Some(_) => Cell::Empty,
            None => Cell::Text(s.clone()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Excel 序列号 -> 日期 (1900 日期系统)
///
/// 1904 日期系统 (旧版 Mac 工作簿) 不做区分，会整体偏移 1462 天。
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::days(serial.floor() as i64))?;
    year_in_range(date).then_some(date)
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let date_part = s.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn year_in_range(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}
