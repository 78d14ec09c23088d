//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the browser backend be swapped (or
//! faked in tests) without touching the text passes.
//!
//! ## Data Flow
//!
//! ```text
//! protect ──▶ normalize ──▶ headings ──▶ restore ──▶ balance
//! (mask code)  (10 passes)   (clamp)      (unmask)    (warn only)
//!                                            │
//!                                            ▼
//!                markup ──▶ envelope ──▶ render ──▶ pages
//!               (comrak)    (HTML doc)   (browser)   (count)
//! ```
//!
//! 1. [`protect`]: swap code blocks, code spans and URLs for opaque tokens
//! 2. [`normalize`]: ordered, pure rewrite passes over the masked text
//! 3. [`headings`]: demote headings that skip levels
//! 4. [`balance`]: report emphasis and code markers left unpaired
//! 5. [`preprocess`]: composes 1–4 and restores the protected spans
//! 6. [`markup`]: Markdown → HTML body, diagram containers
//! 7. [`envelope`]: standalone HTML document and print templates
//! 8. [`browser`]: the engine seam and its headless Chrome implementation
//! 9. [`render`]: session lifecycle, deadlines, atomic artifact write
//! 10. [`pages`]: page count of the produced PDF

pub mod balance;
pub mod browser;
pub mod envelope;
pub mod headings;
pub mod markup;
pub mod normalize;
pub mod pages;
pub mod preprocess;
pub mod protect;
pub mod render;
