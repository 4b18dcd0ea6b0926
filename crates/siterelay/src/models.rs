//! These models represent the objects passed between the site, the relay and the upstream
//!
//! There are a few related formats we need to interact with:
//! - chat requests posted by the site's widgets, which are loosely shaped
//! - openai-style chat completion messages/tools, sent upstream and echoed back
//! - streamed chat completion chunks, handled in `crate::streaming`
//!
//! Messages stay close to the openai wire shape so that anything the browser sends
//! (image parts, extra fields) survives the round trip to the upstream untouched.
pub mod message;
pub mod request;
pub mod role;
pub mod tool;
