use futures::StreamExt;
use gather_pool::{args, Args, GatherPool, PoolOptions};
use tokio::runtime::Handle;
use tracing::info;

fn format_line(a: Args) -> String {
  match (a.str(0), a.str(1)) {
    (Ok(template), Ok(word)) => template.replacen("{}", word, 1),
    (Err(e), _) | (_, Err(e)) => format!("<format failed: {}>", e),
  }
}

fn print_line(line: String) {
  println!("{}", line);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Pipeline Example ---");

  let formatter = GatherPool::<String>::new(PoolOptions::new().name("formatter"), Handle::current());
  let outputter = GatherPool::<()>::new(PoolOptions::new().name("outputter").capacity(2), Handle::current());

  for word in ["one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten"] {
    formatter.submit(format_line, args!["{} potato", word]);
  }

  // Every formatted line becomes a job for the second pool as soon as it arrives.
  let formatted = match formatter.collect() {
    Ok(formatted) => formatted,
    Err(e) => {
      tracing::error!("Failed to collect formatted lines: {}", e);
      return;
    }
  };
  formatted
    .for_each(|line| {
      outputter.submit(print_line, line);
      async {}
    })
    .await;

  outputter.wait().await;
  info!("--- Pipeline Example End ---");
}
