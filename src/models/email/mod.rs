pub mod db_email;
pub mod email_record;
