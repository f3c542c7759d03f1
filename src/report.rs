use serde::Deserialize;

/// Daily attendance report as served by the backend; rendered verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct TodayReport {
    pub present_count: u32,
    pub absent_count: u32,
    pub present: Vec<PresentRecord>,
    pub absent: Vec<AbsentRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresentRecord {
    pub faculty_name: String,
    pub faculty_department: String,
    pub date: String,
    pub arrival_time: String,
    pub status: String,
    pub late_by_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbsentRecord {
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyReport {
    pub year: u16,
    pub month: u8,
    pub total_days: u32,
    pub summary: Vec<MonthlySummaryRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlySummaryRow {
    pub faculty_code: String,
    pub name: String,
    pub department: String,
    pub present: u32,
    pub total_days: u32,
    pub percentage: f64,
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Table body for the present list; a fixed placeholder row when empty.
/// Pure: the same report always renders to the same string.
pub fn render_present_rows(report: &TodayReport) -> String {
    if report.present.is_empty() {
        return r#"<tr><td colspan="6">No one present today.</td></tr>"#.to_string();
    }

    report
        .present
        .iter()
        .map(|f| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&f.faculty_name),
                escape(&f.faculty_department),
                escape(&f.date),
                escape(&f.arrival_time),
                escape(&f.status),
                f.late_by_minutes,
            )
        })
        .collect()
}

pub fn render_absent_rows(report: &TodayReport) -> String {
    if report.absent.is_empty() {
        return r#"<tr><td colspan="2">No absentees today.</td></tr>"#.to_string();
    }

    report
        .absent
        .iter()
        .map(|f| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape(&f.name),
                escape(&f.department),
            )
        })
        .collect()
}

pub fn render_today_page(report: &TodayReport) -> String {
    format!(
        "<html><body>\
         <h1>Today's Attendance</h1>\
         <p>Present: <span id=\"presentCount\">{}</span> \
         Absent: <span id=\"absentCount\">{}</span></p>\
         <h2>Present</h2>\
         <table><thead><tr><th>Name</th><th>Department</th><th>Date</th>\
         <th>Arrival</th><th>Status</th><th>Late (min)</th></tr></thead>\
         <tbody id=\"presentList\">{}</tbody></table>\
         <h2>Absent</h2>\
         <table><thead><tr><th>Name</th><th>Department</th></tr></thead>\
         <tbody id=\"absentList\">{}</tbody></table>\
         </body></html>",
        report.present_count,
        report.absent_count,
        render_present_rows(report),
        render_absent_rows(report),
    )
}

pub fn render_monthly_rows(report: &MonthlyReport) -> String {
    if report.summary.is_empty() {
        return r#"<tr><td colspan="6">No attendance recorded this month.</td></tr>"#.to_string();
    }

    report
        .summary
        .iter()
        .map(|f| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>",
                escape(&f.faculty_code),
                escape(&f.name),
                escape(&f.department),
                f.present,
                f.total_days,
                f.percentage,
            )
        })
        .collect()
}

pub fn render_monthly_page(report: &MonthlyReport) -> String {
    format!(
        "<html><body>\
         <h1>Attendance {:02}/{}</h1>\
         <p>Working days: {}</p>\
         <table><thead><tr><th>Code</th><th>Name</th><th>Department</th>\
         <th>Present</th><th>Days</th><th>Percentage</th></tr></thead>\
         <tbody id=\"monthlyList\">{}</tbody></table>\
         </body></html>",
        report.month,
        report.year,
        report.total_days,
        render_monthly_rows(report),
    )
}
