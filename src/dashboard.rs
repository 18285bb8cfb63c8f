use crate::models::{BarChart, ChartBar, DashboardSummary, Record, RecordStatus, StatusSeries, TablePage};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T]\d{1,2}:\d{2}(?::\d{2})?)?$").expect("valid regex")
});

static WINDOW_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[./](\d{1,2})[./](\d{1,2})(?:\s*(-)\s*(?:(\d{4})[./](\d{1,2})[./](\d{1,2}))?)?$")
        .expect("valid regex")
});

/// The date range a project collected over, parsed from `collected_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl CollectionWindow {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some(captures) = TIMESTAMP_PATTERN.captures(text) {
            let day = date_from(&captures[1], &captures[2], &captures[3])?;
            return Some(Self {
                start: day,
                end: Some(day),
            });
        }

        let captures = WINDOW_PATTERN.captures(text)?;
        let start = date_from(&captures[1], &captures[2], &captures[3])?;
        let end = match (captures.get(4), captures.get(5)) {
            (None, _) => Some(start),
            (Some(_), None) => None,
            (Some(_), Some(_)) => Some(date_from(&captures[5], &captures[6], &captures[7])?),
        };
        Some(Self { start, end })
    }

    /// Collection has started and no end date is recorded yet.
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

fn date_from(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

pub fn summarize(rows: &[Record]) -> DashboardSummary {
    let total_count: f64 = rows.iter().map(|row| row.count).sum();
    let count_with = |status: RecordStatus| rows.iter().filter(|row| row.status == status).count();

    DashboardSummary {
        total_count,
        completed_projects: count_with(RecordStatus::Completed),
        in_progress_projects: count_with(RecordStatus::InProgress),
        paused_projects: count_with(RecordStatus::Paused),
        average_count: if rows.is_empty() {
            0.0
        } else {
            total_count / rows.len() as f64
        },
    }
}

/// One series per status that has rows, plus the mean as a reference line.
pub fn bar_chart(rows: &[Record]) -> BarChart {
    if rows.is_empty() {
        return BarChart::default();
    }

    let series = RecordStatus::ALL
        .into_iter()
        .filter_map(|status| {
            let bars: Vec<ChartBar> = rows
                .iter()
                .filter(|row| row.status == status)
                .map(|row| ChartBar {
                    name: row.name.clone(),
                    count: row.count,
                })
                .collect();
            (!bars.is_empty()).then(|| StatusSeries {
                status,
                label: status.label().to_string(),
                bars,
            })
        })
        .collect();

    BarChart {
        series,
        average: Some(summarize(rows).average_count),
    }
}

/// `page` is 1-based. Rows are ordered by collection start; rows whose
/// `collected_at` does not parse go last.
pub fn table_page(rows: &[Record], page: usize, page_size: usize) -> TablePage {
    let page = page.max(1);
    let page_size = page_size.max(1);

    let mut keyed: Vec<(Option<CollectionWindow>, &Record)> = rows
        .iter()
        .map(|row| (CollectionWindow::parse(&row.collected_at), row))
        .collect();
    keyed.sort_by(|(left_window, left), (right_window, right)| {
        let by_start = match (left_window, right_window) {
            (Some(a), Some(b)) => a.start.cmp(&b.start),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_start.then(left.id.cmp(&right.id))
    });

    let total_rows = keyed.len();
    let page_rows = match (page - 1).checked_mul(page_size) {
        Some(offset) => keyed
            .into_iter()
            .skip(offset)
            .take(page_size)
            .map(|(_, row)| row.clone())
            .collect(),
        None => Vec::new(),
    };

    TablePage {
        page,
        page_size,
        page_count: total_rows.div_ceil(page_size),
        total_rows,
        rows: page_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::{bar_chart, summarize, table_page, CollectionWindow};
    use crate::models::{Record, RecordStatus};
    use chrono::NaiveDate;

    fn record(id: i64, name: &str, collected_at: &str, count: f64, status: RecordStatus) -> Record {
        Record {
            id,
            name: name.to_string(),
            collected_at: collected_at.to_string(),
            count,
            status,
            upload_status: String::new(),
        }
    }

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn parses_closed_open_and_single_windows() {
        let closed = CollectionWindow::parse("2025.04.03-2025.04.20").expect("closed");
        assert_eq!(closed.start, day(2025, 4, 3));
        assert_eq!(closed.end, Some(day(2025, 4, 20)));
        assert!(!closed.is_open());

        let open = CollectionWindow::parse("2025.04.23-").expect("open");
        assert_eq!(open.start, day(2025, 4, 23));
        assert!(open.is_open());

        let stamp = CollectionWindow::parse("2025-05-01 09:30").expect("timestamp");
        assert_eq!(stamp.start, day(2025, 5, 1));
        assert_eq!(stamp.end, Some(day(2025, 5, 1)));

        assert!(CollectionWindow::parse("sometime in spring").is_none());
        assert!(CollectionWindow::parse("2025.13.01-").is_none());
    }

    #[test]
    fn summary_counts_projects_by_status() {
        let rows = vec![
            record(1, "fruit", "2025.04.03-2025.04.20", 23618.0, RecordStatus::Completed),
            record(2, "scan", "2025.04.21-2025.04.22", 6792.0, RecordStatus::Completed),
            record(3, "clean", "2025.04.23-", 1111.0, RecordStatus::InProgress),
        ];

        let summary = summarize(&rows);
        assert_eq!(summary.total_count, 31521.0);
        assert_eq!(summary.completed_projects, 2);
        assert_eq!(summary.in_progress_projects, 1);
        assert_eq!(summary.paused_projects, 0);
        assert_eq!(summary.average_count, 10507.0);

        assert_eq!(summarize(&[]).average_count, 0.0);
    }

    #[test]
    fn chart_groups_bars_by_status() {
        let rows = vec![
            record(1, "a", "", 10.0, RecordStatus::Paused),
            record(2, "b", "", 20.0, RecordStatus::InProgress),
            record(3, "c", "", 30.0, RecordStatus::Paused),
        ];

        let chart = bar_chart(&rows);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].status, RecordStatus::InProgress);
        assert_eq!(chart.series[1].status, RecordStatus::Paused);
        assert_eq!(chart.series[1].bars.len(), 2);
        assert_eq!(chart.series[1].bars[1].name, "c");
        assert_eq!(chart.average, Some(20.0));

        let empty = bar_chart(&[]);
        assert!(empty.series.is_empty());
        assert!(empty.average.is_none());
    }

    #[test]
    fn table_pages_are_sorted_by_collection_start() {
        let rows = vec![
            record(1, "late", "2025.05.01-", 1.0, RecordStatus::InProgress),
            record(2, "unknown", "whenever", 1.0, RecordStatus::InProgress),
            record(3, "early", "2025.04.01-2025.04.02", 1.0, RecordStatus::Completed),
        ];

        let first = table_page(&rows, 1, 2);
        assert_eq!(first.total_rows, 3);
        assert_eq!(first.page_count, 2);
        let names: Vec<&str> = first.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);

        let second = table_page(&rows, 2, 2);
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].name, "unknown");

        assert!(table_page(&rows, 5, 2).rows.is_empty());
    }

    #[test]
    fn huge_page_numbers_yield_empty_pages() {
        let rows = vec![record(1, "only", "2025.04.01-", 1.0, RecordStatus::Paused)];

        let page = table_page(&rows, usize::MAX, 10);
        assert!(page.rows.is_empty());
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.total_rows, 1);
        assert_eq!(page.page_count, 1);

        let wide = table_page(&rows, 2, usize::MAX);
        assert!(wide.rows.is_empty());
        assert_eq!(wide.page_count, 1);
        assert_eq!(table_page(&rows, 1, usize::MAX).rows.len(), 1);
    }
}
