/*!
# CosmeInsight

A survey dashboard for cosmetic products, built in Rust.

## Overview

Customers rate products they have used through a feedback form whose responses
land in a spreadsheet. This crate reads that sheet's published CSV export,
splits the responses by product genre and turns them into comparisons the
store staff can act on: radar charts of mean scores, score distributions,
suggested point-of-sale taglines and per-product QR codes that lead back to
the feedback form.

## Architecture

### Data Layer
- **source**: Fetches the CSV export (HTTP or local file) behind a time-boxed cache
- **table**: Parses the CSV, de-duplicates repeated headers and projects each genre's rows
- **registry**: Static column configuration per genre (Skincare, Haircare)

### Analysis Layer
- **aggregate**: Mean scores grouped by product, age or reported concern
- **tagline**: Strongest attribute of a product and tone-templated marketing lines

### Output Layer
- **graph**: Radar and scatter charts rendered to SVG with plotters
- **qr**: PNG QR codes pointing at the feedback form for one product

### Web Layer (feature `web`)
- **config**: Command-line flags with environment fallbacks
- **pages**: Handlebars templates for each dashboard mode
- **app**: Routing and handlers

## Key Features

- Missing scores are skipped when averaging, never counted as zero
- Groups with no matching responses are kept and drawn as empty polygons
- Ties for a product's strongest attribute go to the first configured column
- A failed sheet load is shown as a warning and leaves every chart blank
- Product names are percent-encoded before they are embedded in a QR link

## HTTP Endpoints

- `/qr`, `/qr.png` - QR issuing page and image
- `/radar` - Comparison by product, age or concern
- `/scatter` - Distribution of two score columns, colored by age
- `/tagline` - Strongest attribute and tagline suggestion
- `/refresh` - Discard the cached sheet and fetch it again
*/

pub mod aggregate;
pub mod error;
pub mod graph;
pub mod qr;
pub mod registry;
pub mod source;
pub mod table;
pub mod tagline;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod pages;

pub use aggregate::{AggregateRow, ConcernMatch, GroupBy, aggregate};
pub use error::DashboardError;
pub use registry::{CategoryConfig, Genre};
pub use source::{SurveyCache, SurveySource};
pub use table::{Dataset, Response};
pub use tagline::{Tagline, Tone, best_feature};
