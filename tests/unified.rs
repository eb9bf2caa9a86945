#[path = "unified/test_diagnostics.rs"]
mod test_diagnostics;
#[path = "unified/test_llvm.rs"]
mod test_llvm;
#[path = "unified/test_tcode.rs"]
mod test_tcode;
#[path = "unified/util.rs"]
mod util;
