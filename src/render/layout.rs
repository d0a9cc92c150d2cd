//! Flow layout: turns report blocks into positioned draw operations, page by
//! page. All distances are millimetres, `y` grows upwards from the bottom edge
//! as in PDF user space.
//!
//! Widths are estimated from an average glyph advance per font, which is close
//! enough for the built-in Helvetica/Courier faces to keep text inside the
//! margins.

const PT_TO_MM: f32 = 25.4 / 72.0;
const LEADING: f32 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    /// Average advance as a fraction of the font size.
    fn advance(self) -> f32 {
        match self {
            Font::Regular => 0.55,
            Font::Bold => 0.6,
            Font::Mono => 0.6,
        }
    }
}

pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().count() as f32 * font.advance() * size * PT_TO_MM
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * LEADING
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub font: Font,
}

impl Span {
    pub fn new(text: impl Into<String>, font: Font) -> Self {
        Self {
            text: text.into(),
            font,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Centered, bold, large.
    Title(String),
    Heading(String),
    Paragraph {
        spans: Vec<Span>,
        size: f32,
        indent: f32,
    },
    /// Two-column label/value grid.
    Table(Vec<(String, String)>),
    /// Horizontal separator across the text column.
    Rule,
    Spacer(f32),
}

impl Block {
    pub fn text(text: impl Into<String>, font: Font, size: f32) -> Self {
        Block::Paragraph {
            spans: vec![Span::new(text, font)],
            size,
            indent: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        font: Font,
        size: f32,
        x: f32,
        y: f32,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Geometry {
    pub const A4: Geometry = Geometry {
        width: 210.0,
        height: 297.0,
        margin: 20.0,
    };

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }
}

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 13.0;
const TABLE_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;
const TABLE_LABEL_WIDTH: f32 = 50.8;
const TABLE_VALUE_WIDTH: f32 = 101.6;
const CELL_PADDING: f32 = 2.0;

/// A wrapped line: runs of text in one font each, in drawing order.
type Line = Vec<(String, Font)>;

/// Greedy word wrap of mixed-font spans. Words longer than the width are
/// broken between characters.
fn wrap(spans: &[Span], size: f32, max_width: f32) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut current: Line = Vec::new();
    let mut width = 0.0;

    let words = spans.iter().flat_map(|span| {
        span.text
            .split_whitespace()
            .map(move |w| (w.to_string(), span.font))
    });

    for (word, font) in words {
        for piece in split_long(&word, font, size, max_width) {
            let w = text_width(&piece, font, size);
            let space = text_width(" ", font, size);
            let needed = if current.is_empty() { w } else { space + w };
            if !current.is_empty() && width + needed > max_width {
                lines.push(std::mem::take(&mut current));
                width = 0.0;
            }
            width += if current.is_empty() { w } else { space + w };
            match current.last_mut() {
                Some((text, f)) if *f == font => {
                    text.push(' ');
                    text.push_str(&piece);
                }
                Some(_) => current.push((format!(" {piece}"), font)),
                None => current.push((piece, font)),
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_long(word: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    if text_width(word, font, size) <= max_width {
        return vec![word.to_string()];
    }
    let per_line = ((max_width / text_width("x", font, size)).floor() as usize).max(1);
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(per_line)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn line_width(line: &Line, size: f32) -> f32 {
    line.iter().map(|(text, font)| text_width(text, *font, size)).sum()
}

struct Cursor {
    geometry: Geometry,
    pages: Vec<Page>,
    y: f32,
}

impl Cursor {
    fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            y: geometry.height - geometry.margin,
        }
    }

    fn top(&self) -> f32 {
        self.geometry.height - self.geometry.margin
    }

    fn bottom(&self) -> f32 {
        self.geometry.margin
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.top();
    }

    fn ensure(&mut self, height: f32) {
        if self.y - height < self.bottom() && self.y < self.top() {
            self.new_page();
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn skip(&mut self, height: f32) {
        self.y -= height;
        if self.y < self.bottom() {
            self.new_page();
        }
    }

    fn draw_line(&mut self, line: &Line, size: f32, x: f32, baseline: f32) {
        let mut x = x;
        for (text, font) in line {
            self.push(DrawOp::Text {
                text: text.clone(),
                font: *font,
                size,
                x,
                y: baseline,
            });
            x += text_width(text, *font, size);
        }
    }

    fn lines(&mut self, lines: &[Line], size: f32, x: f32, centered: bool) {
        let lh = line_height(size);
        let content = self.geometry.content_width();
        for line in lines {
            self.ensure(lh);
            let x = if centered {
                self.geometry.margin + (content - line_width(line, size)).max(0.0) / 2.0
            } else {
                x
            };
            let baseline = self.y - size * PT_TO_MM;
            self.draw_line(line, size, x, baseline);
            self.y -= lh;
        }
    }

    fn table(&mut self, rows: &[(String, String)]) {
        let x0 = self.geometry.margin;
        let x1 = x0 + TABLE_LABEL_WIDTH;
        let x2 = x1 + TABLE_VALUE_WIDTH;
        let lh = line_height(TABLE_SIZE);
        let mut first_on_page = true;

        for (label, value) in rows {
            let label_lines = wrap(
                &[Span::new(label.as_str(), Font::Bold)],
                TABLE_SIZE,
                TABLE_LABEL_WIDTH - 2.0 * CELL_PADDING,
            );
            let value_lines = wrap(
                &[Span::new(value.as_str(), Font::Bold)],
                TABLE_SIZE,
                TABLE_VALUE_WIDTH - 2.0 * CELL_PADDING,
            );
            let rows_needed = label_lines.len().max(value_lines.len()).max(1);
            let height = rows_needed as f32 * lh + 2.0 * CELL_PADDING;

            // rows that fit on a fresh page move there whole; taller ones split
            let page_before = self.pages.len();
            if height <= self.top() - self.bottom() {
                self.ensure(height);
            }
            if self.pages.len() != page_before {
                first_on_page = true;
            }

            let mut start = 0;
            loop {
                let page_before = self.pages.len();
                self.ensure(lh + 2.0 * CELL_PADDING);
                if self.pages.len() != page_before {
                    first_on_page = true;
                }
                let room = self.y - self.bottom() - 2.0 * CELL_PADDING;
                let fit = ((room / lh + 1e-3).floor() as usize).max(1);
                let end = (start + fit).min(rows_needed);
                self.table_segment(
                    [x0, x1, x2],
                    [label_lines.as_slice(), value_lines.as_slice()],
                    start..end,
                    first_on_page,
                );
                first_on_page = false;
                start = end;
                if start >= rows_needed {
                    break;
                }
                self.new_page();
                first_on_page = true;
            }
        }
    }

    /// Draw wrapped lines `range` of one row as a closed cell strip.
    fn table_segment(
        &mut self,
        columns: [f32; 3],
        cells: [&[Line]; 2],
        range: std::ops::Range<usize>,
        with_top: bool,
    ) {
        let [x0, x1, x2] = columns;
        let lh = line_height(TABLE_SIZE);
        let top = self.y;
        let bottom = top - range.len() as f32 * lh - 2.0 * CELL_PADDING;
        if with_top {
            self.push(DrawOp::Line {
                from: (x0, top),
                to: (x2, top),
            });
        }
        self.push(DrawOp::Line {
            from: (x0, bottom),
            to: (x2, bottom),
        });
        for x in columns {
            self.push(DrawOp::Line {
                from: (x, top),
                to: (x, bottom),
            });
        }

        for (lines, x) in cells.into_iter().zip([x0, x1]) {
            let mut baseline = top - CELL_PADDING - TABLE_SIZE * PT_TO_MM;
            for line in lines.iter().skip(range.start).take(range.len()) {
                self.draw_line(line, TABLE_SIZE, x + CELL_PADDING, baseline);
                baseline -= lh;
            }
        }
        self.y = bottom;
    }

    fn rule(&mut self) {
        self.ensure(4.0);
        self.y -= 2.0;
        let (x0, x1) = (self.geometry.margin, self.geometry.width - self.geometry.margin);
        let y = self.y;
        self.push(DrawOp::Line {
            from: (x0, y),
            to: (x1, y),
        });
        self.y -= 2.0;
    }
}

/// Lay out blocks over as many pages as needed and number the pages.
pub fn layout(blocks: &[Block], geometry: Geometry) -> Vec<Page> {
    let mut cursor = Cursor::new(geometry);
    let content = geometry.content_width();

    for block in blocks {
        match block {
            Block::Title(text) => {
                let lines = wrap(&[Span::new(text.as_str(), Font::Bold)], TITLE_SIZE, content);
                cursor.lines(&lines, TITLE_SIZE, geometry.margin, true);
                cursor.skip(8.0);
            }
            Block::Heading(text) => {
                let lines = wrap(&[Span::new(text.as_str(), Font::Bold)], HEADING_SIZE, content);
                // keep the heading with at least one line of what follows
                cursor.ensure(lines.len() as f32 * line_height(HEADING_SIZE) + 8.0);
                cursor.skip(2.0);
                cursor.lines(&lines, HEADING_SIZE, geometry.margin, false);
                cursor.skip(2.0);
            }
            Block::Paragraph {
                spans,
                size,
                indent,
            } => {
                let lines = wrap(spans, *size, content - indent);
                cursor.lines(&lines, *size, geometry.margin + indent, false);
            }
            Block::Table(rows) => cursor.table(rows),
            Block::Rule => cursor.rule(),
            Block::Spacer(height) => cursor.skip(*height),
        }
    }

    let mut pages = cursor.pages;
    // a trailing spacer may have opened a page with nothing on it
    if pages.len() > 1 && pages.last().is_some_and(|p| p.ops.is_empty()) {
        pages.pop();
    }
    number_pages(&mut pages, geometry);
    pages
}

fn number_pages(pages: &mut [Page], geometry: Geometry) {
    let total = pages.len();
    for (i, page) in pages.iter_mut().enumerate() {
        let text = format!("{} / {}", i + 1, total);
        let x = (geometry.width - text_width(&text, Font::Regular, FOOTER_SIZE)) / 2.0;
        page.ops.push(DrawOp::Text {
            text,
            font: Font::Regular,
            size: FOOTER_SIZE,
            x,
            y: geometry.margin / 2.0,
        });
    }
}
