use argmap_interface::Statement;
use argmap_session::SessionSnapshot;

pub fn print_session(snapshot: &SessionSnapshot) {
    if let Some(title) = &snapshot.source_title {
        println!("# {title}");
    }
    if let Some(slug) = &snapshot.slug {
        println!("session: {slug}");
    }
    if let Some(url) = &snapshot.source_url {
        println!("source: {url}");
    }

    match &snapshot.diarization {
        Some(diarization) => {
            println!("\n## Transcript");
            for message in &diarization.messages {
                let name = snapshot
                    .speaker_names
                    .get(&message.speaker)
                    .map(String::as_str)
                    .unwrap_or(&message.speaker);
                match (message.position, message.start_ms) {
                    (Some(pos), Some(start)) => {
                        println!("[{pos}] {} {name}: {}", fmt_ms(start), message.text)
                    }
                    (Some(pos), None) => println!("[{pos}] {name}: {}", message.text),
                    _ => println!("{name}: {}", message.text),
                }
            }
        }
        None if !snapshot.transcript.is_empty() => {
            println!("\n## Transcript (raw)\n{}", snapshot.transcript);
        }
        None => {}
    }

    if !snapshot.statements.is_empty() {
        println!("\n## Argument tree");
        for statement in &snapshot.statements {
            print_statement(snapshot, statement, 0);
        }
    }
}

fn print_statement(snapshot: &SessionSnapshot, statement: &Statement, depth: usize) {
    let indent = "  ".repeat(depth);
    // dangling msg_index means no timestamp, never an error
    let time = statement
        .msg_index
        .and_then(|pos| snapshot.diarization.as_ref()?.message_at(pos)?.start_ms)
        .map(|ms| format!(" @{}", fmt_ms(ms)))
        .unwrap_or_default();
    println!(
        "{indent}- [{}]{time} {}: {}",
        statement.kind, statement.speaker, statement.text
    );
    if let Some(fact_check) = &statement.fact_check {
        println!("{indent}    fact-check: {}", fact_check.verdict);
        if !fact_check.correction.is_empty() {
            println!("{indent}    correction: {}", fact_check.correction);
        }
    }
    if let Some(fallacy) = &statement.fallacy {
        println!("{indent}    fallacy: {} ({})", fallacy.name, fallacy.explanation);
    }
    for child in &statement.children {
        print_statement(snapshot, child, depth + 1);
    }
}

fn fmt_ms(ms: i64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
