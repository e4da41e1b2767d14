use crate::mailer::render_template;
use once_cell::sync::Lazy;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use regex::Regex;
use std::collections::HashMap;

/// Pay periods are free-text "Mon YYYY" tokens ("Jan 2024").
pub static PAY_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) \d{4}$").unwrap()
});

pub fn is_valid_pay_period(period: &str) -> bool {
    PAY_PERIOD_RE.is_match(period)
}

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn two_digits(n: u64) -> String {
    if n < 20 {
        ONES[n as usize].to_string()
    } else if n % 10 == 0 {
        TENS[(n / 10) as usize].to_string()
    } else {
        format!("{} {}", TENS[(n / 10) as usize], ONES[(n % 10) as usize])
    }
}

/// Net salary in words, Indian numbering (crore/lakh/thousand).
pub fn amount_in_words(amount: f64) -> String {
    let rupees = amount.trunc() as u64;
    let paise = ((amount - amount.trunc()) * 100.0).round() as u64;

    let mut parts: Vec<String> = Vec::new();

    let crore = rupees / 10_000_000;
    let lakh = (rupees / 100_000) % 100;
    let thousand = (rupees / 1_000) % 100;
    let hundred = (rupees / 100) % 10;
    let rest = rupees % 100;

    if crore > 0 {
        parts.push(format!("{} Crore", two_digits(crore)));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", two_digits(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", two_digits(thousand)));
    }
    if hundred > 0 {
        parts.push(format!("{} Hundred", ONES[hundred as usize]));
    }
    if rest > 0 {
        parts.push(two_digits(rest));
    }

    let rupee_words = if parts.is_empty() {
        "Zero".to_string()
    } else {
        parts.join(" ")
    };

    if paise > 0 {
        format!(
            "{} Rupees and {} Paise Only",
            rupee_words,
            two_digits(paise)
        )
    } else {
        format!("{} Rupees Only", rupee_words)
    }
}

pub struct PayslipData {
    pub employee_name: String,
    pub employee_code: String,
    pub designation: String,
    pub location: String,
    pub pan_number: String,
    pub pay_period: String,
    pub basic: f64,
    pub hra: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub net_salary: f64,
}

const PAYSLIP_TEMPLATE: &str = "\
Payslip for {{pay_period}}

Employee     : {{employee_name}} ({{employee_code}})
Designation  : {{designation}}
Location     : {{location}}
PAN          : {{pan_number}}

Basic        : {{basic}}
HRA          : {{hra}}
Allowances   : {{allowances}}
Deductions   : {{deductions}}

Net Salary   : {{net_salary}}
In Words     : {{net_in_words}}
";

fn payslip_vars(data: &PayslipData) -> HashMap<String, String> {
    HashMap::from([
        ("employee_name".to_string(), data.employee_name.clone()),
        ("employee_code".to_string(), data.employee_code.clone()),
        ("designation".to_string(), data.designation.clone()),
        ("location".to_string(), data.location.clone()),
        ("pan_number".to_string(), data.pan_number.clone()),
        ("pay_period".to_string(), data.pay_period.clone()),
        ("basic".to_string(), format!("{:.2}", data.basic)),
        ("hra".to_string(), format!("{:.2}", data.hra)),
        ("allowances".to_string(), format!("{:.2}", data.allowances)),
        ("deductions".to_string(), format!("{:.2}", data.deductions)),
        ("net_salary".to_string(), format!("{:.2}", data.net_salary)),
        (
            "net_in_words".to_string(),
            amount_in_words(data.net_salary),
        ),
    ])
}

/// Renders the payslip body by placeholder substitution and rasterizes it to
/// a single-page PDF.
pub fn generate_payslip_pdf(data: &PayslipData) -> anyhow::Result<Vec<u8>> {
    let rendered = render_template(PAYSLIP_TEMPLATE, &payslip_vars(data));

    let (doc, page, layer) = PdfDocument::new(
        format!("Payslip {}", data.pay_period),
        Mm(210.0),
        Mm(297.0),
        "Layer 1",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let current = doc.get_page(page).get_layer(layer);

    let mut y = 275.0;
    for (i, line) in rendered.lines().enumerate() {
        if !line.is_empty() {
            let f = if i == 0 { &bold } else { &font };
            let size = if i == 0 { 14.0 } else { 11.0 };
            current.use_text(line, size, Mm(20.0), Mm(y), f);
        }
        y -= 7.0;
    }

    let bytes = doc.save_to_bytes()?;
    Ok(bytes)
}
