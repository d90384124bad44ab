pub mod attachment_ref;
