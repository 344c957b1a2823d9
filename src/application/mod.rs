// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Workflow coordination only: no image maths, no printing.
// Use cases call into the data, ml and infra layers and hand
// a plain report back to the CLI.

// Build a folder datamodule and report its splits
pub mod inspect_use_case;
