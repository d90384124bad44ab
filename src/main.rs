#[tokio::main]
async fn main() {
  // Minimal CLI: support --version/-V
  let mut args = std::env::args().skip(1);
  if let Some(arg) = args.next() {
    if arg == "--version" || arg == "-V" {
      println!("mailsink {}", env!("CARGO_PKG_VERSION"));
      return;
    }
    if arg == "--help" || arg == "-h" {
      eprintln!("Usage: mailsink [--version]");
      eprintln!("Configured through MAILSINK_* environment variables.");
      return;
    }
  }

  if let Err(e) = mailsink::app::run().await {
    eprintln!("error: {e}");
    std::process::exit(1);
  }
}
