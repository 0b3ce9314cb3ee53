//! Server-rendered pages for the upload form.
//!
//! Everything is plain HTML with a few lines of inline script: one `<select>`
//! toggles which page section is visible, and the submit button shows a
//! spinner while the upload is processed. All user-derived text goes through
//! `html_escape`.

use crate::output::{DocumentText, EXPORT_FILENAME};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

/// Page title and main heading.
pub const TITLE: &str = "Technocrafts Solar Panel Drawing OCR";

const DESCRIPTION: &str = "Upload engineering drawings of solar panels to extract text \
     information using OCR. Every page of the PDF is rendered at 300 DPI and read separately.";

/// Heading of the footer shown on every page.
pub const ABOUT_HEADING: &str = "About This Tool";

/// Shown under the form before anything was uploaded.
pub const UPLOAD_PROMPT: &str = "Please upload a PDF file to begin.";

/// Shown for pages whose text is blank.
pub const NO_TEXT_NOTICE: &str =
    "No text was detected on this page or the OCR failed to recognize text.";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1 { font-size: 1.6rem; }
.notice { padding: .75rem 1rem; border-radius: 6px; margin: 1rem 0; }
.info { background: #e8f1fb; }
.success { background: #e6f6ea; }
.error { background: #fdecea; }
.warning { background: #fff6e0; }
textarea { width: 100%; height: 28rem; font-family: ui-monospace, monospace; }
.page[hidden] { display: none; }
.spinner { display: none; margin-left: .5rem; }
form.busy .spinner { display: inline; }
footer { margin-top: 2rem; padding-top: 1rem; border-top: 1px solid #ddd; font-size: .9rem; }
"#;

const SCRIPT: &str = r#"
document.querySelectorAll('form.upload').forEach(function (form) {
  form.addEventListener('submit', function () { form.classList.add('busy'); });
});
var selector = document.getElementById('page-select');
if (selector) {
  selector.addEventListener('change', function () {
    document.querySelectorAll('section.page').forEach(function (s) {
      s.hidden = s.dataset.page !== selector.value;
    });
  });
}
"#;

fn footer() -> String {
    format!(
        "<footer>\n<h2>{ABOUT_HEADING}</h2>\n<ul>\n\
         <li>This tool is designed for Technocrafts solar panel engineering drawings</li>\n\
         <li>Text is recognized page by page and can be downloaded as <code>{}</code></li>\n\
         <li>Created by Technocrafts Engineering Team</li>\n</ul>\n</footer>",
        encode_text(EXPORT_FILENAME)
    )
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>{TITLE}</h1>\n<p class=\"description\">{DESCRIPTION}</p>\n{body}\n{}\n\
         <script>{SCRIPT}</script>\n</body>\n</html>\n",
        footer()
    )
}

fn upload_form() -> &'static str {
    r#"<form class="upload" method="post" action="/" enctype="multipart/form-data">
<label for="file">Upload a Solar Panel Engineering Drawing PDF</label>
<input type="file" id="file" name="file" accept="application/pdf,.pdf" required>
<button type="submit">Extract text</button>
<span class="spinner">Processing PDF... This may take a while depending on the number of pages.</span>
</form>"#
}

/// `GET /`: the empty upload form.
pub fn index_page() -> String {
    layout(&format!(
        "{}\n<p class=\"notice info\">{}</p>",
        upload_form(),
        UPLOAD_PROMPT
    ))
}

/// `POST /` on failure: the form again plus an error notice.
pub fn error_page(message: &str) -> String {
    layout(&format!(
        "{}\n<p class=\"notice error\">Error processing PDF: {}</p>",
        upload_form(),
        encode_text(message)
    ))
}

/// `data:` URI carrying the export artifact, so the download needs no
/// server-side state.
pub fn export_data_uri(doc: &DocumentText) -> String {
    format!(
        "data:text/plain;charset=utf-8;base64,{}",
        STANDARD.encode(doc.export())
    )
}

/// `POST /` on success: summary, page selector, per-page text and download.
///
/// `selected` is a 1-based page number and must already be in range.
pub fn result_page(doc: &DocumentText, filename: Option<&str>, selected: usize) -> String {
    let mut body = String::new();
    body.push_str(upload_form());

    if let Some(name) = filename {
        let _ = write!(
            body,
            "\n<p>File: <strong>{}</strong></p>",
            encode_text(name)
        );
    }
    let _ = write!(
        body,
        "\n<p class=\"notice success\">Successfully processed {} pages from the PDF!</p>",
        doc.page_count()
    );

    body.push_str("\n<label for=\"page-select\">Select page</label>\n<select id=\"page-select\">");
    for page_num in 1..=doc.page_count() {
        let marker = if page_num == selected { " selected" } else { "" };
        let _ = write!(
            body,
            "<option value=\"{page_num}\"{marker}>Page {page_num}</option>"
        );
    }
    body.push_str("</select>\n");

    for (idx, text) in doc.pages.iter().enumerate() {
        let page_num = idx + 1;
        let hidden = if page_num == selected { "" } else { " hidden" };
        let _ = writeln!(
            body,
            "<section class=\"page\" data-page=\"{page_num}\"{hidden}>\n<h2>Text from Page {page_num}</h2>"
        );
        if doc.is_blank(page_num) {
            let _ = writeln!(body, "<p class=\"notice warning\">{NO_TEXT_NOTICE}</p>");
        } else {
            let _ = writeln!(
                body,
                "<textarea readonly aria-label=\"OCR text of page {page_num}\">{}</textarea>",
                encode_text(text)
            );
        }
        body.push_str("</section>\n");
    }

    let _ = write!(
        body,
        "<p><a download=\"{}\" href=\"{}\">Download all extracted text</a></p>",
        encode_double_quoted_attribute(EXPORT_FILENAME),
        export_data_uri(doc)
    );

    layout(&body)
}
