fn main() {
    // Schema changes must trigger a rebuild so `sqlx::migrate!` embeds them.
    println!("cargo:rerun-if-changed=migrations");
}
