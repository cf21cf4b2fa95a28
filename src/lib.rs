/*!
# Sheetpulse

A backend service that turns uploaded campaign spreadsheets into chart-ready
JSON for the notification analytics dashboard.

## Overview

Marketing teams export event-notification stats (event names, send times,
seen/unseen counts, marketing copy) as `.xlsx` workbooks with inconsistent
column headers. Sheetpulse stores those workbooks, lists them, and normalizes
their rows into a flat payload the dashboard's cards and line charts consume
directly, without ever failing on messy cell content.

## Architecture

The service is a thin HTTP layer over one real component, the spreadsheet
normalizer:

- **Header resolver**: maps each worksheet's literal column headers onto a
  fixed set of semantic fields through an alias table, once per sheet.
- **Row extractor**: converts each raw row into a `NormalizedRow` plus
  index-aligned marketing-copy entries, dropping all-blank rows.
- **Coercion helpers**: total functions for date parts, time parts, numbers
  and booleans; malformed cells degrade to safe defaults instead of erroring.

Everything else (routing, CORS, multipart upload, directory listing, filename
sanitization) is direct pass-through to axum, tower-http, and the filesystem.
Requests are independent: a workbook is read, parsed, converted, and
discarded per request, with no cross-request state.

## Modules

- **app**: Routing, CORS, and HTTP handlers
- **config**: Environment-driven runtime configuration
- **error**: API error taxonomy and response mapping
- **storage**: Workbook storage, listing, and filename validation
- **normalizer**: Header resolution and row extraction
- **coerce**: Cell-level value coercion helpers

## REST API Endpoints

- `GET /api/files` - List stored workbooks, most recent first
- `GET /api/files/{name}/parsed` - Normalized chart payload for one workbook
- `GET /api/files/{name}/raw` - Raw workbook bytes (download/debugging)
- `POST /api/upload` - Multipart `.xlsx` upload
- `DELETE /api/files/{name}` - Remove a workbook (requires `x-admin-pass`)
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod coerce;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod storage;

/// Re-export the core types to make the crate easier to use
pub use config::Config;
pub use error::ApiError;
pub use normalizer::{ChartData, ColumnMap, Field, NormalizedRow};
pub use storage::StoredFile;
