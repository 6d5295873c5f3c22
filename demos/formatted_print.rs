use gather_pool::{args, Arg, ArgError, Args, GatherPool, PoolOptions};
use tokio::runtime::Handle;
use tracing::info;

/// Outcome of one formatting worker: the failure travels inside the result.
#[derive(Debug)]
struct Printed {
  written: usize,
  err: Option<ArgError>,
}

/// Replaces each `{}` in the format string at argument 0 with the following arguments.
fn print_formatted(a: Args) -> Printed {
  let template = match a.str(0) {
    Ok(template) => template,
    Err(e) => return Printed { written: 0, err: Some(e) },
  };

  let mut values = a.tail(1).iter().map(Arg::to_string);
  let mut line = String::new();
  let mut pieces = template.split("{}").peekable();
  while let Some(piece) = pieces.next() {
    line.push_str(piece);
    if pieces.peek().is_some() {
      line.push_str(&values.next().unwrap_or_default());
    }
  }
  println!("{}", line);
  Printed {
    written: line.len() + 1,
    err: None,
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Formatted Print Example ---");

  let pool = GatherPool::<Printed>::new(PoolOptions::new().name("print_pool").capacity(4), Handle::current());

  for word in ["one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten"] {
    pool.submit(print_formatted, args!["{} potato", word]);
  }
  pool.submit(print_formatted, args![]);

  // Only completion matters here.
  pool.wait().await;
  info!("First batch printed.");

  pool.submit(print_formatted, args!["{} {}", "hello", "world"]);
  pool.submit(print_formatted, args![42]);
  match pool.collect() {
    Ok(mut results) => {
      while let Some(printed) = results.next_result().await {
        match printed.err {
          None => info!("Wrote {} bytes", printed.written),
          Some(e) => info!("Worker failed: {}", e),
        }
      }
    }
    Err(e) => tracing::error!("Failed to collect results: {}", e),
  }
  info!("--- Formatted Print Example End ---");
}
