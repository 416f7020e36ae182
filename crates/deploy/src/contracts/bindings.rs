//! ABI bindings of the contracts driven by the clients.

use alloy_core::sol;

sol! {
    interface ISimpleStorage {
        struct Person {
            string name;
            uint256 favoriteNumber;
        }

        function store(uint256 favoriteNumber) external;
        function retrieve_fave_number() external view returns (uint256);
        function addPersonMemory(Person memory person) external;
        function addPersonCalldata(Person calldata person) external;
        function people(uint256 index) external view returns (string name, uint256 favoriteNumber);
        function nameToFavoriteNumber(string name) external view returns (uint256);
    }

    interface IToken {
        function totalSupply() external view returns (uint256);
        function owner() external view returns (address);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external;
    }

    interface IFundMe {
        function fund() external payable;
        function withdraw() external;
        function cheaperWithdraw() external;
        function getAddressToDonations(address funder) external view returns (uint256);
        function funders(uint256 index) external view returns (address);
        function getOwner() external view returns (address);
        function priceFeed() external view returns (address);
    }

    interface ILottery {
        event LotteryEnter(address indexed player);
        event RequestedLotteryWinner(uint256 indexed requestId);
        event WinnerPicked(address indexed winner);

        function enterLottery() external payable;
        function getEntranceFee() external view returns (uint256);
        function getInterval() external view returns (uint256);
        function getLotteryState() external view returns (uint8);
        function getPlayer(uint256 index) external view returns (address);
        function getNumberOfPlayers() external view returns (uint256);
        function getWinner() external view returns (address);
        function getTimestamp() external view returns (uint256);
        function checkUpkeep(bytes performData) external view returns (bool upkeepNeeded, bytes data);
        function performUpkeep(bytes performData) external;
        function rawFulfillRandomWords(uint256 requestId, uint256[] randomWords) external;
    }

    interface IPriceFeedMock {
        function decimals() external view returns (uint8);
        function latestAnswer() external view returns (int256);
        function updateAnswer(int256 answer) external;
    }

    interface IVRFCoordinatorV2Mock {
        event SubscriptionCreated(uint64 indexed subId, address owner);
        event SubscriptionFunded(uint64 indexed subId, uint256 oldBalance, uint256 newBalance);
        event RandomWordsRequested(
            bytes32 indexed keyHash,
            uint256 requestId,
            uint256 preSeed,
            uint64 indexed subId,
            uint16 minimumRequestConfirmations,
            uint32 callbackGasLimit,
            uint32 numWords,
            address indexed sender
        );
        event RandomWordsFulfilled(uint256 indexed requestId, uint256 outputSeed, uint96 payment, bool success);

        function createSubscription() external returns (uint64 subId);
        function fundSubscription(uint64 subId, uint96 amount) external;
        function requestRandomWords(
            bytes32 keyHash,
            uint64 subId,
            uint16 minimumRequestConfirmations,
            uint32 callbackGasLimit,
            uint32 numWords
        ) external returns (uint256 requestId);
        function fulfillRandomWords(uint256 requestId, address consumer) external;
    }
}
