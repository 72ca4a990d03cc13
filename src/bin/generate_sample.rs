use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

fn text_array(values: &[String]) -> StringArray {
    StringArray::from(values.iter().map(|s| s.as_str()).collect::<Vec<_>>())
}

fn main() {
    let mut rng = SimpleRng::new(42);
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_feedback.parquet".to_string());

    let models = ["GPT-4", "Claude", "Gemini", "Llama-3"];
    let projects = ["DocsBot", "SupportDesk", "CodeHelper"];
    let queries = [
        "How do I sort a list in Python?",
        "Explain recursion with an example",
        "Summarise the refund policy",
        "Why does my build fail on Windows?",
        "Translate this paragraph to German",
        "What is the difference between TCP and UDP?",
        "Write a SQL query for monthly revenue",
        "Reset my account password",
    ];
    let feedback = [
        "Exactly what I needed",
        "Answer was too long",
        "Missed the point of the question",
        "Clear and correct",
    ];

    // Each model has its own chance of a thumbs-up.
    let approval = [("GPT-4", 0.8), ("Claude", 0.85), ("Gemini", 0.7), ("Llama-3", 0.6)];

    let mut partition_keys: Vec<String> = Vec::new();
    let mut row_keys: Vec<String> = Vec::new();
    let mut timestamps: Vec<String> = Vec::new();
    let mut ai_models: Vec<String> = Vec::new();
    let mut project_names: Vec<String> = Vec::new();
    let mut thumbs: Vec<String> = Vec::new();
    let mut user_queries: Vec<String> = Vec::new();
    let mut responses: Vec<String> = Vec::new();
    let mut user_feedback: Vec<Option<String>> = Vec::new();
    let mut latencies: Vec<i64> = Vec::new();

    let n_rows = 500;
    for row_id in 0..n_rows {
        let model = rng.pick(&models);
        let project = rng.pick(&projects);
        let query = rng.pick(&queries);
        let rate = approval
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, r)| *r)
            .unwrap_or(0.5);
        let up = rng.next_f64() < rate;

        partition_keys.push(project.to_string());
        row_keys.push(format!("{row_id:06}"));
        timestamps.push(format!(
            "2024-{:02}-{:02}T{:02}:{:02}:00Z",
            1 + row_id % 12,
            1 + row_id % 28,
            row_id % 24,
            row_id % 60
        ));
        ai_models.push(model.to_string());
        project_names.push(project.to_string());
        thumbs.push(if up { "True" } else { "False" }.to_string());
        user_queries.push(query.to_string());
        responses.push(format!("[{model}] response to: {query}"));
        // Most users leave no written feedback.
        user_feedback.push((rng.next_f64() < 0.3).then(|| rng.pick(&feedback).to_string()));
        latencies.push(200 + (rng.next_u64() % 4800) as i64);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("PartitionKey", DataType::Utf8, false),
        Field::new("RowKey", DataType::Utf8, false),
        Field::new("Timestamp", DataType::Utf8, false),
        Field::new("AI_Model", DataType::Utf8, false),
        Field::new("Project_Name", DataType::Utf8, false),
        Field::new("Thumbs", DataType::Utf8, false),
        Field::new("User_Query", DataType::Utf8, false),
        Field::new("AI_Response", DataType::Utf8, false),
        Field::new("User_Feedback", DataType::Utf8, true),
        Field::new("Latency_Ms", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(text_array(&partition_keys)),
            Arc::new(text_array(&row_keys)),
            Arc::new(text_array(&timestamps)),
            Arc::new(text_array(&ai_models)),
            Arc::new(text_array(&project_names)),
            Arc::new(text_array(&thumbs)),
            Arc::new(text_array(&user_queries)),
            Arc::new(text_array(&responses)),
            Arc::new(StringArray::from(user_feedback)),
            Arc::new(Int64Array::from(latencies)),
        ],
    )
    .expect("Failed to create RecordBatch");

    // Write Parquet
    let file = std::fs::File::create(&output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!("Wrote {n_rows} feedback records to {output_path}");
}
