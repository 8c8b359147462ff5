use crate::error::IngestError;
use crate::models::{DocumentKind, UploadedFile};
use lopdf::Document;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Returns one entry per page, in page order. Pages without extractable
    /// text are kept with an empty string.
    fn extract_pages(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load_mem(bytes).map_err(|error| IngestError::PdfParse {
            file: file_name.to_string(),
            details: error.to_string(),
        })?;

        let pages = document
            .get_pages()
            .into_keys()
            .map(|page_no| {
                let text = match document.extract_text(&[page_no]) {
                    Ok(text) => text,
                    Err(error) => {
                        debug!(file = file_name, page = page_no, %error, "page has no extractable text");
                        String::new()
                    }
                };
                PageText {
                    number: page_no,
                    text,
                }
            })
            .collect();

        Ok(pages)
    }
}

/// Full text of an uploaded document: PDF pages joined with newlines, or the
/// UTF-8 decoding of a plain-text file.
pub fn extract_text(file: &UploadedFile) -> Result<String, IngestError> {
    extract_text_with(&LopdfExtractor, file)
}

pub fn extract_text_with<P: PdfExtractor>(
    extractor: &P,
    file: &UploadedFile,
) -> Result<String, IngestError> {
    let kind = file.kind().ok_or_else(|| IngestError::UnsupportedFile {
        file: file.name.clone(),
        mime_type: file.mime_type.clone(),
    })?;

    match kind {
        DocumentKind::Pdf => {
            let pages = extractor.extract_pages(&file.name, &file.bytes)?;
            Ok(pages
                .into_iter()
                .map(|page| page.text)
                .collect::<Vec<_>>()
                .join("\n"))
        }
        DocumentKind::Text => {
            String::from_utf8(file.bytes.clone()).map_err(|source| IngestError::InvalidUtf8 {
                file: file.name.clone(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PDF_MIME_TYPE, TEXT_MIME_TYPE};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn two_page_pdf(first_page_text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(first_page_text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().expect("content should encode");
        let text_content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let blank_content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));

        let first_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => text_content_id,
        });
        let second_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => blank_content_id,
        });

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![first_page.into(), second_page.into()],
            "Count" => 2,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("pdf should serialize");
        bytes
    }

    #[test]
    fn text_upload_is_decoded_verbatim() {
        let content = "Line one\n\n  indented — ünïcode\r\nend";
        let file = UploadedFile::new("notes.txt", TEXT_MIME_TYPE, content.as_bytes().to_vec());

        let text = extract_text(&file).expect("utf-8 text should decode");
        assert_eq!(text, content);
    }

    #[test]
    fn invalid_utf8_text_is_rejected() {
        let file = UploadedFile::new("bad.txt", TEXT_MIME_TYPE, vec![0x66, 0xff, 0xfe]);

        let error = extract_text(&file).expect_err("invalid utf-8 must fail");
        assert!(matches!(error, IngestError::InvalidUtf8 { ref file, .. } if file == "bad.txt"));
    }

    #[test]
    fn unsupported_upload_is_rejected() {
        let file = UploadedFile::new("photo.png", "image/png", vec![1, 2, 3]);

        let error = extract_text(&file).expect_err("png is not supported");
        assert!(matches!(error, IngestError::UnsupportedFile { .. }));
    }

    #[test]
    fn pdf_pages_are_extracted_in_order_and_blank_pages_kept() {
        let bytes = two_page_pdf("Hello World");

        let pages = LopdfExtractor
            .extract_pages("doc.pdf", &bytes)
            .expect("pdf should load");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Hello World"));
        assert!(pages[1].text.trim().is_empty());

        let file = UploadedFile::new("doc.pdf", PDF_MIME_TYPE, bytes);
        let text = extract_text(&file).expect("pdf should extract");
        assert!(text.contains("Hello World"));
    }

    #[test]
    fn corrupt_pdf_is_a_parse_error() {
        let file = UploadedFile::new("broken.pdf", PDF_MIME_TYPE, b"%PDF-1.4\n%broken".to_vec());

        let error = extract_text(&file).expect_err("corrupt pdf must fail");
        assert!(matches!(error, IngestError::PdfParse { ref file, .. } if file == "broken.pdf"));
    }

    struct FixedPages(Vec<&'static str>);

    impl PdfExtractor for FixedPages {
        fn extract_pages(&self, _file_name: &str, _bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: (*text).to_string(),
                })
                .collect())
        }
    }

    #[test]
    fn pdf_pages_are_joined_with_newlines() {
        let extractor = FixedPages(vec!["first", "", "third"]);
        let file = UploadedFile::new("a.pdf", PDF_MIME_TYPE, Vec::new());

        let text = extract_text_with(&extractor, &file).expect("fixed pages should join");
        assert_eq!(text, "first\n\nthird");
    }
}
