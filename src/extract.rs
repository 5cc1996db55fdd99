//! Gallery item extraction from saved Civitai HTML pages.
//!
//! Every `div.civnsfw.model-block` on a page becomes one [`Record`]. Inside a
//! block the sample image is `img[data-sampleimg="true"]` and the generation
//! parameters are a `<dt>`/`<dd>` list paired by position.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::{Field, Record};

/// Problems found in a block that still yielded a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockIssue {
    /// No `img[data-sampleimg="true"]` inside the block.
    MissingSampleImage,
    /// The sample image has no `src` attribute.
    MissingImageSource,
    /// `<dt>` and `<dd>` counts differ; pairs past the shorter list were dropped.
    UnpairedEntries { labels: usize, values: usize },
}

/// Result of reading one matched block. A matched block always produces a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Complete(Record),
    Degraded {
        record: Record,
        issues: Vec<BlockIssue>,
    },
}

impl BlockOutcome {
    pub fn record(&self) -> &Record {
        match self {
            BlockOutcome::Complete(record) => record,
            BlockOutcome::Degraded { record, .. } => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            BlockOutcome::Complete(record) => record,
            BlockOutcome::Degraded { record, .. } => record,
        }
    }

    pub fn issues(&self) -> &[BlockIssue] {
        match self {
            BlockOutcome::Complete(_) => &[],
            BlockOutcome::Degraded { issues, .. } => issues,
        }
    }
}

/// A parsed document. Extraction over it can be repeated and yields the same records.
pub struct ParsedPage {
    html: Html,
}

impl ParsedPage {
    /// Number of markup errors the HTML parser recovered from.
    pub fn markup_errors(&self) -> usize {
        self.html.errors.len()
    }
}

pub struct Extractor {
    block: Selector,
    sample_image: Selector,
    label: Selector,
    value: Selector,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            block: Selector::parse("div.civnsfw.model-block").expect("valid block selector"),
            sample_image: Selector::parse(r#"img[data-sampleimg="true"]"#)
                .expect("valid sample image selector"),
            label: Selector::parse("dt").expect("valid label selector"),
            value: Selector::parse("dd").expect("valid value selector"),
        }
    }

    pub fn parse(&self, html: &str) -> ParsedPage {
        let html = Html::parse_document(html);
        if !html.errors.is_empty() {
            debug!(errors = html.errors.len(), "recovered from malformed markup");
        }
        ParsedPage { html }
    }

    /// Lazily reads every gallery block in document order.
    pub fn blocks<'a>(&'a self, page: &'a ParsedPage) -> impl Iterator<Item = BlockOutcome> + 'a {
        page.html
            .select(&self.block)
            .map(move |block| self.read_block(block))
    }

    /// Lazily yields one record per gallery block.
    pub fn records<'a>(&'a self, page: &'a ParsedPage) -> impl Iterator<Item = Record> + 'a {
        self.blocks(page).map(|outcome| {
            if let BlockOutcome::Degraded { issues, .. } = &outcome {
                debug!(?issues, "gallery block degraded");
            }
            outcome.into_record()
        })
    }

    /// Parses `html` and collects its records.
    pub fn extract(&self, html: &str) -> Vec<Record> {
        let page = self.parse(html);
        self.records(&page).collect()
    }

    fn read_block(&self, block: ElementRef<'_>) -> BlockOutcome {
        let mut record = Record::default();
        let mut issues = Vec::new();

        match block.select(&self.sample_image).next() {
            Some(img) => match img.value().attr("src") {
                Some(src) => record.image_url = src.to_string(),
                None => issues.push(BlockIssue::MissingImageSource),
            },
            None => issues.push(BlockIssue::MissingSampleImage),
        }

        let labels: Vec<String> = block.select(&self.label).map(stripped_text).collect();
        let values: Vec<String> = block.select(&self.value).map(stripped_text).collect();
        if labels.len() != values.len() {
            issues.push(BlockIssue::UnpairedEntries {
                labels: labels.len(),
                values: values.len(),
            });
        }

        // 位置で対応付け (後勝ち)
        for (label, value) in labels.into_iter().zip(values) {
            if let Some(field) = Field::from_label(&label) {
                record.set(field, value);
            }
        }

        if issues.is_empty() {
            BlockOutcome::Complete(record)
        } else {
            BlockOutcome::Degraded { record, issues }
        }
    }
}

/// Each text node trimmed, empty pieces dropped, joined without separator.
fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_BLOCK: &str = r#"
        <div class="civnsfw model-block">
          <img data-sampleimg="true" src="https://image.civitai.com/xG1n/sample.jpeg" alt="sample">
          <dl>
            <dt>Prompt</dt><dd> masterpiece, best quality </dd>
            <dt>Negative prompt</dt><dd>lowres, bad anatomy</dd>
            <dt>Seed</dt><dd>3894471046</dd>
            <dt>Size</dt><dd>512x768</dd>
            <dt>Model</dt><dd>dreamshaper_8</dd>
            <dt>Sampler</dt><dd>DPM++ 2M Karras</dd>
            <dt>Steps</dt><dd>30</dd>
            <dt>CFG scale</dt><dd>7</dd>
            <dt>Resources</dt><dd>[{"name":"add_detail","type":"lora","weight":0.6}]</dd>
            <dt>Model hash</dt><dd>879db523c3</dd>
          </dl>
        </div>"#;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head><title>t</title></head><body>{body}</body></html>")
    }

    fn full_record() -> Record {
        Record {
            image_url: "https://image.civitai.com/xG1n/sample.jpeg".into(),
            prompt: "masterpiece, best quality".into(),
            negative_prompt: "lowres, bad anatomy".into(),
            seed: "3894471046".into(),
            size: "512x768".into(),
            model: "dreamshaper_8".into(),
            sampler: "DPM++ 2M Karras".into(),
            steps: "30".into(),
            cfg_scale: "7".into(),
            resources: r#"[{"name":"add_detail","type":"lora","weight":0.6}]"#.into(),
            model_hash: "879db523c3".into(),
        }
    }

    #[test]
    fn no_blocks_yields_nothing() {
        let extractor = Extractor::new();
        assert!(extractor.extract("").is_empty());
        assert!(extractor
            .extract(&page("<div class=\"model-block\"><dt>Seed</dt><dd>1</dd></div>"))
            .is_empty());
        assert!(extractor
            .extract(&page("<section class=\"civnsfw model-block\"></section>"))
            .is_empty());
    }

    #[test]
    fn full_block_populates_every_field() {
        let extractor = Extractor::new();
        let parsed = extractor.parse(&page(FULL_BLOCK));
        let blocks: Vec<_> = extractor.blocks(&parsed).collect();
        assert_eq!(blocks, vec![BlockOutcome::Complete(full_record())]);
    }

    #[test]
    fn missing_labels_become_empty_strings() {
        let html = page(
            r#"<div class="civnsfw model-block">
                 <img data-sampleimg="true" src="a.png">
                 <dl><dt>Seed</dt><dd>42</dd><dt>Steps</dt><dd>20</dd></dl>
               </div>"#,
        );
        let records = Extractor::new().extract(&html);
        assert_eq!(
            records,
            vec![Record {
                image_url: "a.png".into(),
                seed: "42".into(),
                steps: "20".into(),
                ..Record::default()
            }]
        );
    }

    #[test]
    fn block_without_sample_image_is_degraded_not_dropped() {
        let html = page(
            r#"<div class="civnsfw model-block">
                 <img src="avatar.png">
                 <dl><dt>Model</dt><dd>sdxl</dd></dl>
               </div>
               <div class="civnsfw model-block">
                 <img data-sampleimg="true">
               </div>"#,
        );
        let extractor = Extractor::new();
        let parsed = extractor.parse(&html);
        let blocks: Vec<_> = extractor.blocks(&parsed).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].issues(), &[BlockIssue::MissingSampleImage]);
        assert_eq!(blocks[0].record().model, "sdxl");
        assert_eq!(blocks[0].record().image_url, "");
        assert_eq!(blocks[1].issues(), &[BlockIssue::MissingImageSource]);
        assert_eq!(blocks[1].record(), &Record::default());
    }

    #[test]
    fn unknown_labels_are_ignored() {
        let html = page(
            r#"<div class="civnsfw model-block">
                 <img data-sampleimg="true" src="x">
                 <dl><dt>Clip skip</dt><dd>2</dd><dt>prompt</dt><dd>lower</dd><dt>Seed</dt><dd>7</dd></dl>
               </div>"#,
        );
        let records = Extractor::new().extract(&html);
        assert_eq!(records[0].seed, "7");
        assert_eq!(records[0].prompt, "");
    }

    // dt/dd are paired by position, not adjacency. A missing <dd> shifts every
    // later value onto the wrong label.
    #[test]
    fn misaligned_lists_pair_by_position_and_are_flagged() {
        let html = page(
            r#"<div class="civnsfw model-block">
                 <img data-sampleimg="true" src="x">
                 <dl>
                   <dt>Prompt</dt>
                   <dt>Seed</dt><dd>123</dd>
                   <dt>Steps</dt><dd>25</dd>
                 </dl>
               </div>"#,
        );
        let extractor = Extractor::new();
        let parsed = extractor.parse(&html);
        let outcome = extractor.blocks(&parsed).next().unwrap();
        assert_eq!(
            outcome.issues(),
            &[BlockIssue::UnpairedEntries {
                labels: 3,
                values: 2
            }]
        );
        let record = outcome.into_record();
        assert_eq!(record.prompt, "123");
        assert_eq!(record.seed, "25");
        assert_eq!(record.steps, "");
    }

    #[test]
    fn nested_text_pieces_are_trimmed_and_joined() {
        let html = page(
            r#"<div class="civnsfw model-block">
                 <dl>
                   <dt> <span>Model</span> </dt>
                   <dd>
                     <a href="/models/4384">DreamShaper</a>
                   </dd>
                   <dt>Sampler</dt><dd>Euler <b>a</b></dd>
                 </dl>
               </div>"#,
        );
        let records = Extractor::new().extract(&html);
        assert_eq!(records[0].model, "DreamShaper");
        assert_eq!(records[0].sampler, "Eulera");
    }

    #[test]
    fn later_duplicate_label_wins() {
        let html = page(
            r#"<div class="civnsfw model-block">
                 <dl><dt>Seed</dt><dd>1</dd><dt>Seed</dt><dd>2</dd></dl>
               </div>"#,
        );
        assert_eq!(Extractor::new().extract(&html)[0].seed, "2");
    }

    #[test]
    fn malformed_block_does_not_affect_neighbours() {
        let html = page(&format!(
            r#"<div class="civnsfw model-block">
                 <dl><dt>Seed<dd>99<dt>Size<dd>1024x1024</dl>
                 <p><b>unclosed
               </div>
               {FULL_BLOCK}"#
        ));
        let extractor = Extractor::new();
        let parsed = extractor.parse(&html);
        let records: Vec<_> = extractor.records(&parsed).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seed, "99");
        assert_eq!(records[0].size, "1024x1024");
        assert_eq!(records[1], full_record());
    }

    // Both classes must be present, in any order and alongside others. This is
    // looser than an exact `class="civnsfw model-block"` attribute match.
    #[test]
    fn blocks_come_out_in_document_order_and_rerun_identically() {
        let html = page(
            r#"<div class="civnsfw model-block"><dl><dt>Seed</dt><dd>1</dd></dl></div>
               <div><div class="civnsfw model-block"><dl><dt>Seed</dt><dd>2</dd></dl></div></div>
               <div class="model-block civnsfw"><dl><dt>Seed</dt><dd>3</dd></dl></div>"#,
        );
        let extractor = Extractor::new();
        let parsed = extractor.parse(&html);
        let first: Vec<_> = extractor.records(&parsed).collect();
        let second: Vec<_> = extractor.records(&parsed).collect();
        let seeds: Vec<_> = first.iter().map(|r| r.seed.as_str()).collect();
        assert_eq!(seeds, vec!["1", "2", "3"]);
        assert_eq!(first, second);
        assert_eq!(first, extractor.extract(&html));
    }
}
