fn main() {
    sigdispatch::sigwatch_main()
}
