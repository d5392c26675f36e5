// Booth submissions kept in an Excel workbook.
//
// The booth worksheet has one row per booth. The header names the columns: booth
// id, booth name, one column per candidate, and the formal, informal and total
// votes. The optional TCP worksheet has one row per distribution entry: booth id,
// TCP label, source candidate, votes.

use booth_aggregation::{RawBooth, RawCount};
use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{debug, warn};
use snafu::prelude::*;

use crate::tally::{
    io_common::{field_key, make_default_id},
    *,
};

// Column positions of the booth worksheet.
#[derive(Debug)]
struct BoothColumns {
    id: usize,
    name: usize,
    formal: Option<usize>,
    informal: Option<usize>,
    total: Option<usize>,
    candidates: Vec<(usize, String)>,
}

fn header_names(header: &[DataType]) -> Vec<Option<String>> {
    header
        .iter()
        .map(|dt| match dt {
            DataType::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

fn find_column(names: &[Option<String>], keys: &[&str]) -> Option<usize> {
    names.iter().position(|n| {
        n.as_ref()
            .map(|s| keys.contains(&field_key(s).as_str()))
            .unwrap_or(false)
    })
}

fn booth_columns(header: &[DataType]) -> BTallyResult<BoothColumns> {
    let names = header_names(header);
    let id = find_column(&names, &["boothid", "id"]).context(ExcelMissingColumnSnafu {
        column: "Booth ID",
    })?;
    let name = find_column(&names, &["boothname", "name"]).context(ExcelMissingColumnSnafu {
        column: "Booth Name",
    })?;
    let formal = find_column(&names, &["formal"]);
    let informal = find_column(&names, &["informal"]);
    let total = find_column(&names, &["total"]);
    let reserved = [Some(id), Some(name), formal, informal, total];
    let candidates: Vec<(usize, String)> = names
        .iter()
        .enumerate()
        .filter(|(idx, _)| !reserved.contains(&Some(*idx)))
        .filter_map(|(idx, n)| n.as_ref().map(|s| (idx, s.clone())))
        .collect();
    Ok(BoothColumns {
        id,
        name,
        formal,
        informal,
        total,
        candidates,
    })
}

fn cell_count(cell: Option<&DataType>) -> RawCount {
    match cell {
        Some(DataType::Int(i)) => RawCount::Integer(*i),
        Some(DataType::Float(f)) => RawCount::Float(*f),
        Some(DataType::String(s)) => RawCount::Text(s.clone()),
        _ => RawCount::Missing,
    }
}

fn cell_text(cell: Option<&DataType>, lineno: usize, column: &str) -> BTallyResult<Option<String>> {
    match cell {
        Some(DataType::String(s)) if s.trim().is_empty() => Ok(None),
        Some(DataType::String(s)) => Ok(Some(s.trim().to_string())),
        Some(DataType::Int(i)) => Ok(Some(i.to_string())),
        // Ids typed as numbers are read back as floats.
        Some(DataType::Float(f)) if f.fract() == 0.0 => Ok(Some(format!("{}", *f as i64))),
        None | Some(DataType::Empty) => Ok(None),
        Some(other) => Err(Box::new(TallyError::ExcelWrongCellType {
            lineno: lineno as u64,
            column: column.to_string(),
            content: format!("{:?}", other),
        })),
    }
}

fn get_range(path: &str, worksheet_name_o: Option<&str>) -> BTallyResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        &path, &worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(worksheet_name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => Err(Box::new(TallyError::EmptyExcel {})),
            [(worksheet_name, wrange)] => {
                debug!("get_range: path: {:?} worksheet: {:?}", &path, &worksheet_name);
                Ok(wrange.clone())
            }
            _ => Err(Box::new(TallyError::ExcelAmbiguousWorksheet {
                path: path.to_string(),
            })),
        }
    }
}

pub fn read_xlsx_booths(path: String, cfs: &FileSource) -> BTallyResult<Vec<RawBooth>> {
    let default_id = make_default_id(&path);
    let wrange = get_range(&path, cfs.excel_worksheet_name.as_deref())?;

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu {})?;
    let cols = booth_columns(header)?;
    debug!("read_xlsx_booths: columns: {:?}", cols);

    let mut res: Vec<RawBooth> = Vec::new();
    // Line numbers start at 1, with the header on line 1.
    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        if row.iter().all(|c| *c == DataType::Empty) {
            continue;
        }
        let booth_id = cell_text(row.get(cols.id), lineno, "booth id")?.unwrap_or_else(|| default_id(lineno));
        let booth_name = cell_text(row.get(cols.name), lineno, "booth name")?.unwrap_or_default();
        let booth = RawBooth {
            timestamp: None,
            primary: cols
                .candidates
                .iter()
                .map(|(col, name)| (name.clone(), cell_count(row.get(*col))))
                .collect(),
            tcp: Vec::new(),
            formal: cell_count(cols.formal.and_then(|c| row.get(c))),
            informal: cell_count(cols.informal.and_then(|c| row.get(c))),
            total: cell_count(cols.total.and_then(|c| row.get(c))),
            booth_id,
            booth_name,
        };
        debug!("read_xlsx_booths: line {}: {:?}", lineno, booth);
        res.push(booth);
    }

    if let Some(tcp_sheet) = cfs.tcp_worksheet_name.as_deref() {
        let trange = get_range(&path, Some(tcp_sheet))?;
        add_distributions(&mut res, &trange)?;
    }
    Ok(res)
}

// Rows of the TCP worksheet: booth id, TCP label, source candidate, votes.
fn add_distributions(booths: &mut [RawBooth], trange: &calamine::Range<DataType>) -> BTallyResult<()> {
    let mut rows = trange.rows();
    rows.next();
    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        let booth_id = cell_text(row.first(), lineno, "booth id")?;
        let label = cell_text(row.get(1), lineno, "TCP label")?;
        let source = cell_text(row.get(2), lineno, "source candidate")?;
        let (booth_id, label, source) = match (booth_id, label, source) {
            (Some(b), Some(l), Some(s)) => (b, l, s),
            _ => {
                debug!("add_distributions: skipping incomplete line {}: {:?}", lineno, row);
                continue;
            }
        };
        let votes = cell_count(row.get(3));
        match booths.iter_mut().find(|b| b.booth_id == booth_id) {
            Some(booth) => match booth.tcp.iter_mut().find(|(l, _)| *l == label) {
                Some((_, dist)) => dist.push((source, votes)),
                None => booth.tcp.push((label, vec![(source, votes)])),
            },
            None => warn!(
                "add_distributions: line {}: no booth {:?} in the booth worksheet",
                lineno, booth_id
            ),
        }
    }
    Ok(())
}
