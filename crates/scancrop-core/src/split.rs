//! Document split with a shared trailing template page
//!
//! The last page of the source is captured as the template before anything else happens. All
//! pages, the last one included, are then grouped into consecutive chunks of `chunk_size`, and
//! every chunk gets the template appended as its final page. Chunks are persisted as
//! `<prefix>1.pdf`, `<prefix>2.pdf`, ... in chunk order.

use crate::error::ScanCropError;
use crate::raster::inherited;
use crate::recombine::write_atomic;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// One group of consecutive source pages plus the shared template page
#[derive(Debug, Clone)]
pub struct SplitChunk<P> {
    source_pages: Vec<P>,
    template: Arc<P>,
}

impl<P> SplitChunk<P> {
    pub fn source_pages(&self) -> &[P] {
        &self.source_pages
    }

    pub fn template(&self) -> &Arc<P> {
        &self.template
    }

    /// Source pages followed by the template
    pub fn pages(&self) -> impl Iterator<Item = &P> {
        self.source_pages
            .iter()
            .chain(std::iter::once(self.template.as_ref()))
    }

    /// Page count including the template
    pub fn len(&self) -> usize {
        self.source_pages.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Partition `pages` into chunks of `chunk_size`, each sharing the last page as template
///
/// Produces `ceil(P / chunk_size)` chunks; the final one may be short. No pages means no chunks.
pub fn partition<P: Clone>(
    pages: Vec<P>,
    chunk_size: usize,
) -> Result<Vec<SplitChunk<P>>, ScanCropError> {
    if chunk_size == 0 {
        return Err(ScanCropError::InvalidChunkSize(chunk_size));
    }
    let template = match pages.last() {
        Some(last) => Arc::new(last.clone()),
        None => return Ok(Vec::new()),
    };

    let mut chunks = Vec::with_capacity(pages.len().div_ceil(chunk_size));
    let mut remaining = pages.into_iter();
    loop {
        let group: Vec<P> = remaining.by_ref().take(chunk_size).collect();
        if group.is_empty() {
            break;
        }
        chunks.push(SplitChunk {
            source_pages: group,
            template: Arc::clone(&template),
        });
    }
    Ok(chunks)
}

/// A page of a loaded PDF: its 1-based number and page object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfPageRef {
    pub number: u32,
    pub id: ObjectId,
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub chunk_size: usize,
    pub output_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            output_dir: PathBuf::from("Split Documents"),
            file_prefix: "split_document_".to_string(),
        }
    }
}

/// A persisted chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    pub path: PathBuf,
    /// 1-based source page numbers, excluding the template
    pub source_pages: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct SplitReport {
    pub chunks: Vec<ChunkFile>,
}

impl SplitReport {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Splits PDFs into template-terminated chunks
#[derive(Debug, Clone)]
pub struct DocumentSplitter {
    options: SplitOptions,
}

impl DocumentSplitter {
    pub fn new(options: SplitOptions) -> Result<Self, ScanCropError> {
        if options.chunk_size == 0 {
            return Err(ScanCropError::InvalidChunkSize(0));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    /// Split an in-memory PDF, returning each serialized chunk with its source page numbers
    pub fn split_bytes(&self, bytes: &[u8]) -> Result<Vec<(Vec<u32>, Vec<u8>)>, ScanCropError> {
        let source =
            Document::load_mem(bytes).map_err(|e| ScanCropError::ParseError(e.to_string()))?;

        let pages: Vec<PdfPageRef> = source
            .get_pages()
            .into_iter()
            .map(|(number, id)| PdfPageRef { number, id })
            .collect();
        let chunks = partition(pages, self.options.chunk_size)?;

        chunks
            .iter()
            .map(|chunk| -> Result<(Vec<u32>, Vec<u8>), ScanCropError> {
                let mut doc = build_chunk(&source, chunk)?;
                let mut buffer = Vec::new();
                doc.save_to(&mut buffer)
                    .map_err(|e| ScanCropError::OperationError(format!("Save failed: {}", e)))?;
                let numbers: Vec<u32> = chunk.source_pages().iter().map(|p| p.number).collect();
                Ok((numbers, buffer))
            })
            .collect()
    }

    /// Split `input` into numbered chunk files under the configured output directory
    pub fn split_file(&self, input: &Path) -> Result<SplitReport, ScanCropError> {
        let bytes = std::fs::read(input).map_err(|e| ScanCropError::io(input, e))?;
        let chunks = self.split_bytes(&bytes)?;

        if chunks.is_empty() {
            warn!(
                input = %input.display(),
                "Source document has no pages; no chunks written"
            );
            return Ok(SplitReport::default());
        }

        let dir = &self.options.output_dir;
        std::fs::create_dir_all(dir).map_err(|e| ScanCropError::io(dir, e))?;

        let mut report = SplitReport::default();
        for (n, (source_pages, bytes)) in chunks.into_iter().enumerate() {
            let path = dir.join(format!("{}{}.pdf", self.options.file_prefix, n + 1));
            write_atomic(&path, &bytes)?;
            debug!(path = %path.display(), pages = ?source_pages, "Chunk written");
            report.chunks.push(ChunkFile { path, source_pages });
        }

        info!(
            chunks = report.chunks.len(),
            chunk_size = self.options.chunk_size,
            output_dir = %dir.display(),
            "Split complete"
        );
        Ok(report)
    }
}

/// Copy of `source` whose page tree is exactly the chunk's pages followed by the template
fn build_chunk(
    source: &Document,
    chunk: &SplitChunk<PdfPageRef>,
) -> Result<Document, ScanCropError> {
    let mut doc = source.clone();
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(chunk.len());

    for page in chunk.source_pages() {
        let mut dict = flattened_page(source, page.id)?;
        dict.set("Parent", pages_id);
        doc.objects.insert(page.id, Object::Dictionary(dict));
        kids.push(Object::Reference(page.id));
    }

    // The template gets its own page object; its content streams are shared with the source.
    let mut template = flattened_page(source, chunk.template().id)?;
    template.set("Parent", pages_id);
    kids.push(Object::Reference(doc.add_object(template)));

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| ScanCropError::OperationError("No Root in trailer".into()))?;
    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| ScanCropError::OperationError("Catalog not found".into()))?;
    catalog.set("Pages", pages_id);
    // outlines point at pages that may no longer exist
    catalog.remove(b"Outlines");

    doc.prune_objects();
    Ok(doc)
}

/// Page dictionary with inherited attributes copied in, so it renders the same under a new parent
fn flattened_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, ScanCropError> {
    let mut dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|_| {
            ScanCropError::ParseError(format!("Page object {:?} is not a dictionary", page_id))
        })?
        .clone();

    for key in INHERITABLE {
        if !dict.has(key) {
            if let Some(value) = inherited(doc, page_id, key) {
                dict.set(key.to_vec(), value.clone());
            }
        }
    }
    Ok(dict)
}
