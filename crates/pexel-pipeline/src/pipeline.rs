// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation pipeline: leases inputs from the artifact store, validates the
// request against the catalog, runs the document engine on a blocking
// worker and stores binary results.

use std::sync::Arc;

use pexel_core::error::{PexelError, Result};
use pexel_core::{
    Artifact, ArtifactHandle, ArtifactReceipt, DocumentInfo, MediaType, OperationResult,
    PageRangeSpec, ServiceConfig, SplitMode, StructuredData, TextExtraction, resolve,
};
use pexel_document::{DocumentEngine, EngineError, LopdfEngine};
use pexel_store::{ArtifactStore, PutOptions};
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Invocation, Operation, Request};
use crate::params::Parameters;

/// Output of the blocking stage, before it is stored.
#[derive(Debug)]
enum Output {
    Binary {
        bytes: Vec<u8>,
        media_type: MediaType,
        file_name: String,
    },
    Data(StructuredData),
}

/// Runs catalog operations over stored artifacts.
///
/// Cheap to clone; clones share the engine and the store.
pub struct OperationPipeline<E: DocumentEngine = LopdfEngine> {
    engine: Arc<E>,
    store: Arc<ArtifactStore>,
    max_upload_bytes: u64,
}

impl<E: DocumentEngine> Clone for OperationPipeline<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            store: Arc::clone(&self.store),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

impl<E: DocumentEngine> OperationPipeline<E> {
    pub fn new(engine: E, store: Arc<ArtifactStore>, config: &ServiceConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Store an uploaded input.
    #[instrument(skip(self, bytes), fields(size = bytes.len(), %media_type))]
    pub async fn ingest(
        &self,
        bytes: &[u8],
        media_type: MediaType,
        file_name: Option<String>,
    ) -> Result<Artifact> {
        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(PexelError::UploadTooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        let options = PutOptions {
            ttl_seconds: None,
            file_name,
        };
        self.store.put(bytes, media_type, options).await
    }

    /// Run `operation_name` over `inputs` (in the given order).
    ///
    /// Grammar and parameter errors surface unchanged; any engine failure is
    /// reported as [`PexelError::OperationFailed`].  Nothing is stored
    /// unless the whole operation succeeds.
    #[instrument(skip(self, inputs, parameters), fields(input_count = inputs.len()))]
    pub async fn execute(
        &self,
        operation_name: &str,
        inputs: &[ArtifactHandle],
        parameters: &Parameters,
    ) -> Result<OperationResult> {
        let leases = inputs
            .iter()
            .map(|handle| self.store.get(*handle))
            .collect::<Result<Vec<_>>>()?;

        let operation: Operation = operation_name.parse()?;
        let invocation = operation.validate(parameters)?;
        let artifacts: Vec<Artifact> = leases.iter().map(|lease| lease.artifact().clone()).collect();
        operation.inputs().check(&artifacts)?;

        let mut payloads = Vec::with_capacity(leases.len());
        for lease in &leases {
            payloads.push(lease.read_all().await?);
        }
        drop(leases);
        let input_bytes: u64 = artifacts.iter().map(|artifact| artifact.size_bytes).sum();

        let engine = Arc::clone(&self.engine);
        let ttl_seconds = invocation.ttl_seconds;
        let output = tokio::task::spawn_blocking(move || run(engine.as_ref(), &invocation, &payloads))
            .await
            .map_err(|err| {
                warn!(%operation, error = %err, "Operation worker did not complete");
                PexelError::OperationFailed {
                    operation: operation.name().to_string(),
                    cause: "processing task aborted".to_string(),
                }
            })??;

        match output {
            Output::Data(data) => {
                debug!(%operation, "Operation returned structured data");
                Ok(OperationResult::Data(data))
            }
            Output::Binary {
                bytes,
                media_type,
                file_name,
            } => {
                let options = PutOptions {
                    ttl_seconds,
                    file_name: Some(file_name),
                };
                let artifact = self.store.put(&bytes, media_type, options).await?;
                info!(
                    %operation,
                    handle = %artifact.handle,
                    input_bytes,
                    output_bytes = artifact.size_bytes,
                    "Operation completed"
                );
                Ok(OperationResult::Artifact(ArtifactReceipt {
                    artifact,
                    input_bytes,
                }))
            }
        }
    }
}

/// The blocking stage: open inputs, resolve page ranges, transform.
fn run<E: DocumentEngine>(engine: &E, invocation: &Invocation, inputs: &[Vec<u8>]) -> Result<Output> {
    let operation = invocation.operation;
    let fail = |err: EngineError| {
        warn!(%operation, error = %err, "Document engine failed");
        PexelError::OperationFailed {
            operation: operation.name().to_string(),
            cause: err.to_string(),
        }
    };
    let pdf = |bytes: Vec<u8>| Output::Binary {
        bytes,
        media_type: MediaType::Pdf,
        file_name: output_name(operation, MediaType::Pdf),
    };

    match &invocation.request {
        Request::Merge => {
            let documents = inputs
                .iter()
                .map(|bytes| engine.open(bytes))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(fail)?;
            return engine.merge(&documents).map(pdf).map_err(fail);
        }
        Request::FromImages { paper } => {
            return engine.images_to_pdf(inputs, *paper).map(pdf).map_err(fail);
        }
        _ => {}
    }

    // Every remaining operation takes exactly one PDF.
    let bytes = inputs.first().ok_or_else(|| PexelError::invalid("inputs", "no input"))?;
    let document = engine.open(bytes).map_err(fail)?;
    let select = |expression: &str| -> Result<PageRangeSpec> {
        resolve(expression, engine.page_count(&document))
    };

    let output = match &invocation.request {
        Request::Split { pages: expr, mode } => {
            let selection = select(expr.as_str())?;
            match mode {
                SplitMode::Extract => pdf(engine.split(&document, selection.pages()).map_err(fail)?),
                SplitMode::Burst => {
                    let mut entries = Vec::with_capacity(selection.len());
                    for page in selection.iter() {
                        let part = engine.split(&document, &[page]).map_err(fail)?;
                        entries.push((format!("page_{page}.pdf"), part));
                    }
                    bundle(engine, operation, &entries).map_err(fail)?
                }
                SplitMode::Groups => {
                    let mut entries = Vec::new();
                    for run in selection.contiguous_runs() {
                        let name = if run.start() == run.end() {
                            format!("page_{}.pdf", run.start())
                        } else {
                            format!("pages_{}-{}.pdf", run.start(), run.end())
                        };
                        let group: Vec<u32> = run.collect();
                        entries.push((name, engine.split(&document, &group).map_err(fail)?));
                    }
                    bundle(engine, operation, &entries).map_err(fail)?
                }
            }
        }
        Request::Rotate {
            rotation,
            pages: expr,
        } => {
            let selection = select(expr.as_str())?;
            pdf(engine
                .rotate(&document, selection.pages(), *rotation)
                .map_err(fail)?)
        }
        Request::Compress { tier } => pdf(engine.recompress(&document, *tier).map_err(fail)?),
        Request::Protect {
            user_password,
            owner_password,
        } => pdf(engine
            .encrypt(&document, user_password, owner_password)
            .map_err(fail)?),
        Request::Unlock { password } => pdf(engine.decrypt(&document, password).map_err(fail)?),
        Request::Watermark(style) => pdf(engine.watermark(&document, style).map_err(fail)?),
        Request::Paginate(style) => pdf(engine.number_pages(&document, style).map_err(fail)?),
        Request::ToImages {
            format,
            dpi,
            pages: expr,
        } => {
            let selection = select(expr.as_str())?;
            let media_type = format.media_type();
            let mut rendered = Vec::with_capacity(selection.len());
            for page in selection.iter() {
                let image = engine
                    .render_page(&document, page, *dpi, *format)
                    .map_err(fail)?;
                rendered.push((format!("page_{page}.{}", media_type.extension()), image));
            }
            if rendered.len() == 1 {
                let (file_name, bytes) = rendered.remove(0);
                Output::Binary {
                    bytes,
                    media_type,
                    file_name,
                }
            } else {
                bundle(engine, operation, &rendered).map_err(fail)?
            }
        }
        Request::ExtractText { pages: expr } => {
            let selection = select(expr.as_str())?;
            let text = engine
                .extract_text(&document, selection.pages())
                .map_err(fail)?;
            Output::Data(StructuredData::Text(TextExtraction {
                total_pages: selection.page_count(),
                pages: text,
            }))
        }
        Request::Metadata => Output::Data(StructuredData::Info(DocumentInfo {
            total_pages: engine.page_count(&document),
            is_encrypted: engine.is_encrypted(&document),
            metadata: engine.metadata(&document).map_err(fail)?,
        })),
        Request::Merge | Request::FromImages { .. } => {
            return Err(PexelError::invalid("inputs", "unexpected single input"));
        }
    };
    Ok(output)
}

fn bundle<E: DocumentEngine>(
    engine: &E,
    operation: Operation,
    entries: &[(String, Vec<u8>)],
) -> std::result::Result<Output, EngineError> {
    Ok(Output::Binary {
        bytes: engine.bundle(entries)?,
        media_type: MediaType::Zip,
        file_name: output_name(operation, MediaType::Zip),
    })
}

/// `<prefix><8 hex chars>.<ext>`, e.g. `merged_1a2b3c4d.pdf`.
fn output_name(operation: Operation, media_type: MediaType) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}{}.{}",
        operation.output_prefix(),
        &suffix[..8],
        media_type.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pexel_core::{CompressionTier, PageText, PaperSize, RasterFormat, Rotation};
    use pexel_document::{ImageProcessor, PageGeometry, PageNumberStyle, PdfReader, WatermarkStyle};
    use pexel_store::{ExpiryScheduler, ManualClock};
    use pexel_store::backoff::DeferralPolicy;
    use std::collections::BTreeMap;
    use std::io::{Cursor, Read};

    // -- Fixtures -------------------------------------------------------------

    struct Fixture<E: DocumentEngine> {
        _dir: tempfile::TempDir,
        pipeline: OperationPipeline<E>,
    }

    async fn fixture<E: DocumentEngine>(engine: E) -> Fixture<E> {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            storage_dir: dir.path().to_path_buf(),
            max_upload_bytes: 1024 * 1024,
            store_capacity_bytes: 64 * 1024 * 1024,
            ..ServiceConfig::default()
        };
        let clock = Arc::new(ManualClock::default());
        let scheduler = Arc::new(ExpiryScheduler::new(DeferralPolicy::default(), clock.clone()));
        let store = ArtifactStore::open(&config, scheduler, clock).await.unwrap();
        Fixture {
            _dir: dir,
            pipeline: OperationPipeline::new(engine, store, &config),
        }
    }

    fn png(width_pt: f32, height_pt: f32) -> Vec<u8> {
        let page = PageGeometry {
            origin_x: 0.0,
            origin_y: 0.0,
            width: width_pt,
            height: height_pt,
            rotate: 0,
        };
        ImageProcessor::page_canvas(&page, 72)
            .unwrap()
            .encode(RasterFormat::Png)
            .unwrap()
    }

    /// A real PDF with `pages` pages of the given paper size.
    fn pdf(paper: PaperSize, pages: usize) -> Vec<u8> {
        let images: Vec<Vec<u8>> = (0..pages).map(|_| png(20.0, 20.0)).collect();
        LopdfEngine.images_to_pdf(&images, paper).unwrap()
    }

    fn widths(bytes: &[u8]) -> Vec<u32> {
        let reader = PdfReader::from_bytes(bytes).unwrap();
        (1..=reader.page_count())
            .map(|page| reader.page_geometry(page).unwrap().width.round() as u32)
            .collect()
    }

    async fn output_bytes<E: DocumentEngine>(fx: &Fixture<E>, result: &OperationResult) -> Vec<u8> {
        let artifact = result.artifact().expect("binary result");
        let lease = fx.pipeline.store().get(artifact.handle).unwrap();
        lease.read_all().await.unwrap()
    }

    /// Engine that treats every document as an encrypted blob protected by
    /// the password "open-sesame".
    #[derive(Debug, Default)]
    struct LockedEngine;

    impl DocumentEngine for LockedEngine {
        type Document = Vec<u8>;

        fn open(&self, bytes: &[u8]) -> pexel_document::EngineResult<Vec<u8>> {
            Ok(bytes.to_vec())
        }
        fn page_count(&self, _: &Vec<u8>) -> u32 {
            3
        }
        fn is_encrypted(&self, _: &Vec<u8>) -> bool {
            true
        }
        fn render_page(&self, _: &Vec<u8>, _: u32, _: u32, _: RasterFormat) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn merge(&self, _: &[Vec<u8>]) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn split(&self, _: &Vec<u8>, _: &[u32]) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn rotate(&self, _: &Vec<u8>, _: &[u32], _: Rotation) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn encrypt(&self, doc: &Vec<u8>, _: &str, _: &str) -> pexel_document::EngineResult<Vec<u8>> {
            Ok(doc.clone())
        }
        fn decrypt(&self, doc: &Vec<u8>, password: &str) -> pexel_document::EngineResult<Vec<u8>> {
            if password == "open-sesame" {
                Ok(doc.clone())
            } else {
                Err(EngineError::WrongPassword)
            }
        }
        fn watermark(&self, _: &Vec<u8>, _: &WatermarkStyle) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn number_pages(&self, _: &Vec<u8>, _: &PageNumberStyle) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn recompress(&self, _: &Vec<u8>, _: CompressionTier) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
        fn extract_text(&self, _: &Vec<u8>, _: &[u32]) -> pexel_document::EngineResult<Vec<PageText>> {
            Err(EngineError::Encrypted)
        }
        fn metadata(&self, _: &Vec<u8>) -> pexel_document::EngineResult<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }
        fn images_to_pdf(&self, _: &[Vec<u8>], _: PaperSize) -> pexel_document::EngineResult<Vec<u8>> {
            Err(EngineError::Encrypted)
        }
    }

    // -- Tests ----------------------------------------------------------------

    #[tokio::test]
    async fn merge_preserves_submission_order() {
        let fx = fixture(LopdfEngine).await;
        let a = fx.pipeline.ingest(&pdf(PaperSize::A4, 2), MediaType::Pdf, None).await.unwrap();
        let b = fx.pipeline.ingest(&pdf(PaperSize::Letter, 1), MediaType::Pdf, None).await.unwrap();

        let result = fx
            .pipeline
            .execute("merge", &[b.handle, a.handle], &Parameters::new())
            .await
            .unwrap();
        let artifact = result.artifact().unwrap();
        assert_eq!(artifact.media_type, MediaType::Pdf);
        assert!(artifact.file_name.as_deref().unwrap().starts_with("merged_"));
        // Letter is 612 pt wide, A4 595 pt.
        assert_eq!(widths(&output_bytes(&fx, &result).await), vec![612, 595, 595]);
    }

    #[tokio::test]
    async fn merge_needs_two_inputs() {
        let fx = fixture(LopdfEngine).await;
        let a = fx.pipeline.ingest(&pdf(PaperSize::A4, 1), MediaType::Pdf, None).await.unwrap();
        let err = fx
            .pipeline
            .execute("merge", &[a.handle], &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PexelError::InvalidParameter { ref name, .. } if name == "inputs"));
    }

    #[tokio::test]
    async fn rotate_by_45_is_invalid() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 1), MediaType::Pdf, None).await.unwrap();
        let err = fx
            .pipeline
            .execute("rotate", &[doc.handle], &Parameters::new().with("angle", "45"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
        assert_eq!(fx.pipeline.store().stats().artifacts, 1);
    }

    #[tokio::test]
    async fn rotate_selected_pages_swaps_their_geometry() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 3), MediaType::Pdf, None).await.unwrap();
        let result = fx
            .pipeline
            .execute(
                "rotate",
                &[doc.handle],
                &Parameters::new().with("angle", "90").with("pages", "2"),
            )
            .await
            .unwrap();
        let reader = PdfReader::from_bytes(&output_bytes(&fx, &result).await).unwrap();
        let rotations: Vec<i64> = (1..=3)
            .map(|page| reader.page_geometry(page).unwrap().rotate)
            .collect();
        assert_eq!(rotations, vec![0, 90, 0]);
    }

    #[tokio::test]
    async fn page_range_errors_surface_unchanged() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 3), MediaType::Pdf, None).await.unwrap();

        let err = fx
            .pipeline
            .execute("split", &[doc.handle], &Parameters::new().with("pages", "2-9"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PexelError::OutOfRange {
                index: 9,
                page_count: 3
            }
        ));

        let err = fx
            .pipeline
            .execute("split", &[doc.handle], &Parameters::new().with("pages", "3-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PexelError::InvertedRange { start: 3, end: 1 }));
    }

    #[tokio::test]
    async fn split_burst_yields_one_pdf_per_page() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 4), MediaType::Pdf, None).await.unwrap();
        let result = fx
            .pipeline
            .execute(
                "split",
                &[doc.handle],
                &Parameters::new().with("pages", "1,3-4").with("mode", "burst"),
            )
            .await
            .unwrap();
        assert_eq!(result.artifact().unwrap().media_type, MediaType::Zip);

        let mut archive = zip::ZipArchive::new(Cursor::new(output_bytes(&fx, &result).await)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["page_1.pdf", "page_3.pdf", "page_4.pdf"]);

        let mut first = Vec::new();
        archive.by_index(0).unwrap().read_to_end(&mut first).unwrap();
        assert_eq!(widths(&first).len(), 1);
    }

    #[tokio::test]
    async fn split_groups_follow_contiguous_runs() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 6), MediaType::Pdf, None).await.unwrap();
        let result = fx
            .pipeline
            .execute(
                "split",
                &[doc.handle],
                &Parameters::new().with("pages", "1-2,4,5-6").with("mode", "groups"),
            )
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(output_bytes(&fx, &result).await)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["pages_1-2.pdf", "pages_4-6.pdf"]);
    }

    #[tokio::test]
    async fn to_images_single_and_multiple_pages() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::Letter, 2), MediaType::Pdf, None).await.unwrap();

        let single = fx
            .pipeline
            .execute("pdf-to-images", &[doc.handle], &Parameters::new().with("dpi", "72"))
            .await
            .unwrap();
        let artifact = single.artifact().unwrap();
        assert_eq!(artifact.media_type, MediaType::Png);
        assert_eq!(artifact.file_name.as_deref(), Some("page_1.png"));
        let image = ImageProcessor::from_bytes(&output_bytes(&fx, &single).await).unwrap();
        assert_eq!(image.width(), 612);

        let both = fx
            .pipeline
            .execute(
                "to-images",
                &[doc.handle],
                &Parameters::new().with("pages", "all").with("format", "jpeg"),
            )
            .await
            .unwrap();
        assert_eq!(both.artifact().unwrap().media_type, MediaType::Zip);
    }

    #[tokio::test]
    async fn from_images_checks_input_kind() {
        let fx = fixture(LopdfEngine).await;
        let image = fx.pipeline.ingest(&png(30.0, 40.0), MediaType::Png, None).await.unwrap();
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 1), MediaType::Pdf, None).await.unwrap();

        let result = fx
            .pipeline
            .execute("images-to-pdf", &[image.handle], &Parameters::new().with("paper", "letter"))
            .await
            .unwrap();
        assert_eq!(widths(&output_bytes(&fx, &result).await), vec![612]);

        let err = fx
            .pipeline
            .execute("from-images", &[image.handle, doc.handle], &Parameters::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn metadata_is_returned_inline() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 2), MediaType::Pdf, None).await.unwrap();
        let before = fx.pipeline.store().stats().artifacts;

        let result = fx
            .pipeline
            .execute("get-metadata", &[doc.handle], &Parameters::new())
            .await
            .unwrap();
        let Some(StructuredData::Info(info)) = result.data() else {
            panic!("expected document info, got {result:?}");
        };
        assert_eq!(info.total_pages, 2);
        assert!(!info.is_encrypted);
        assert_eq!(fx.pipeline.store().stats().artifacts, before);
    }

    #[tokio::test]
    async fn ttl_override_reaches_the_output() {
        let fx = fixture(LopdfEngine).await;
        let doc = fx.pipeline.ingest(&pdf(PaperSize::A4, 1), MediaType::Pdf, None).await.unwrap();
        let result = fx
            .pipeline
            .execute(
                "compress",
                &[doc.handle],
                &Parameters::new().with("quality", "high").with("ttl_seconds", "30"),
            )
            .await
            .unwrap();
        let OperationResult::Artifact(receipt) = result else {
            panic!("expected an artifact");
        };
        assert_eq!(receipt.artifact.ttl_seconds, 30);
        assert_eq!(receipt.input_bytes, doc.size_bytes);
    }

    #[tokio::test]
    async fn wrong_password_stores_nothing() {
        let fx = fixture(LockedEngine).await;
        let doc = fx.pipeline.ingest(b"locked", MediaType::Pdf, None).await.unwrap();

        let err = fx
            .pipeline
            .execute("unlock", &[doc.handle], &Parameters::new().with("password", "wrong"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, PexelError::OperationFailed { ref operation, ref cause }
                if operation == "unlock" && cause == "wrong password")
        );
        assert_eq!(fx.pipeline.store().stats().artifacts, 1);
        assert_eq!(fx.pipeline.store().stats().active_readers, 0);

        let ok = fx
            .pipeline
            .execute("unlock", &[doc.handle], &Parameters::new().with("password", "open-sesame"))
            .await
            .unwrap();
        assert!(ok.artifact().unwrap().file_name.as_deref().unwrap().starts_with("unlocked_"));
    }

    #[tokio::test]
    async fn protect_then_unlock_restores_every_page() {
        let fx = fixture(LopdfEngine).await;
        let source = LopdfEngine
            .merge(&[
                LopdfEngine.open(&pdf(PaperSize::A4, 2)).unwrap(),
                LopdfEngine.open(&pdf(PaperSize::Letter, 1)).unwrap(),
            ])
            .unwrap();
        let doc = fx.pipeline.ingest(&source, MediaType::Pdf, None).await.unwrap();

        let protected = fx
            .pipeline
            .execute("protect", &[doc.handle], &Parameters::new().with("password", "s3cret"))
            .await
            .unwrap();
        let locked = protected.artifact().unwrap().handle;
        assert!(PdfReader::from_bytes(&output_bytes(&fx, &protected).await).unwrap().is_encrypted());

        let before = fx.pipeline.store().stats().artifacts;
        let err = fx
            .pipeline
            .execute("unlock", &[locked], &Parameters::new().with("password", "guess"))
            .await
            .unwrap_err();
        assert!(matches!(err, PexelError::OperationFailed { ref cause, .. } if cause == "wrong password"));
        assert_eq!(fx.pipeline.store().stats().artifacts, before);

        let unlocked = fx
            .pipeline
            .execute("unlock", &[locked], &Parameters::new().with("password", "s3cret"))
            .await
            .unwrap();
        assert_eq!(fx.pipeline.store().stats().artifacts, before + 1);
        assert_eq!(widths(&output_bytes(&fx, &unlocked).await), vec![595, 595, 612]);
    }

    #[tokio::test]
    async fn missing_input_and_unknown_operation() {
        let fx = fixture(LockedEngine).await;
        let err = fx
            .pipeline
            .execute("unlock", &[ArtifactHandle::new()], &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PexelError::NotFound(_)));

        let doc = fx.pipeline.ingest(b"x", MediaType::Pdf, None).await.unwrap();
        let err = fx
            .pipeline
            .execute("shred", &[doc.handle], &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PexelError::UnknownOperation(ref name) if name == "shred"));
    }

    #[tokio::test]
    async fn oversized_upload_is_refused() {
        let fx = fixture(LockedEngine).await;
        let big = vec![0u8; 1024 * 1024 + 1];
        let err = fx.pipeline.ingest(&big, MediaType::Pdf, None).await.unwrap_err();
        assert!(matches!(err, PexelError::UploadTooLarge { max: 1_048_576, .. }));
    }
}
