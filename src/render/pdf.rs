use super::layout::{DrawOp, Font, Geometry, Page};
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, Point};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("PDF generation failed: {0}")]
pub struct PdfError(String);

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
}

impl Fonts {
    fn get(&self, font: Font) -> &IndirectFontRef {
        match font {
            Font::Regular => &self.regular,
            Font::Bold => &self.bold,
            Font::Mono => &self.mono,
        }
    }
}

/// Draw laid-out pages into an in-memory PDF.
///
/// Uses the builtin base-14 faces, which only cover Latin-1. Other scripts
/// come out as placeholder glyphs rather than failing the render.
pub fn write_pdf(pages: &[Page], title: &str, geometry: Geometry) -> Result<Vec<u8>, PdfError> {
    let (width, height) = (Mm(geometry.width), Mm(geometry.height));
    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");

    let builtin = |font| {
        doc.add_builtin_font(font)
            .map_err(|e| PdfError(format!("{e:?}")))
    };
    let fonts = Fonts {
        regular: builtin(BuiltinFont::Helvetica)?,
        bold: builtin(BuiltinFont::HelveticaBold)?,
        mono: builtin(BuiltinFont::Courier)?,
    };

    for (i, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        layer.set_outline_thickness(0.5);

        for op in &page.ops {
            match op {
                DrawOp::Text {
                    text,
                    font,
                    size,
                    x,
                    y,
                } => layer.use_text(text.as_str(), *size, Mm(*x), Mm(*y), fonts.get(*font)),
                DrawOp::Line { from, to } => layer.add_line(Line {
                    points: vec![
                        (Point::new(Mm(from.0), Mm(from.1)), false),
                        (Point::new(Mm(to.0), Mm(to.1)), false),
                    ],
                    is_closed: false,
                }),
            }
        }
    }

    doc.save_to_bytes().map_err(|e| PdfError(format!("{e:?}")))
}
