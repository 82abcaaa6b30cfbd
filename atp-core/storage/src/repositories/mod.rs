mod generations;
mod projects;
mod runs;
mod test_cases;

pub use generations::GenerationRepository;
pub use projects::ProjectRepository;
pub use runs::RunRepository;
pub use test_cases::TestCaseRepository;
