//! Pipeline stages for book-to-DjVu conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets the planner
//! wire only the stages a given source kind needs.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ compress ──▶ assemble ──▶ outline
//! (path/URL) (ebook-     (encode +    (djvm -c,    (djvused
//!            convert +    c44 per      djvm -i)     set-outline)
//!            unpack +     page)
//!            rename)
//! ```
//!
//! 1. [`input`]    — canonicalise the configured source to a local path
//! 2. [`extract`]  — PDF only: paginate via `ebook-convert`, unpack the page
//!    entries, rename them to canonical `page-NNN.ext` names ([`rename`])
//! 3. [`compress`] — encode each page to a portable map ([`encode`]) and
//!    compress it into a single-page DjVu
//! 4. [`assemble`] — build the multipage document, pages in canonical order
//! 5. [`outline`]  — optionally attach bookmarks to the finished document
//!
//! [`transcode`] sits outside the conversion flow: a standalone JPEG→PNG
//! normalisation pass for images directories.

pub mod assemble;
pub mod compress;
pub mod encode;
pub mod extract;
pub mod input;
pub mod outline;
pub mod rename;
pub mod transcode;
